// SPDX-License-Identifier: Apache-2.0
//! Records exchanged with the upstream API and with admin clients.
//!
//! Upstream identifies records by `_id`; the admin surface uses `id`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[serde(rename = "All Levels")]
    AllLevels,
}

/// Editable course fields (everything but the id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetails {
    pub title: String,
    pub path: String,
    pub description: String,
    pub short_description: String,
    pub instructor: String,
    pub duration: String,
    pub level: CourseLevel,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus_download_link: Option<String>,
    pub enroll_link: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub what_you_will_learn: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(flatten)]
    pub details: CourseDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCourse {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(flatten)]
    pub details: CourseDetails,
    #[serde(default)]
    pub is_active: bool,
}

impl From<ApiCourse> for Course {
    fn from(record: ApiCourse) -> Self {
        Course {
            id: record.id,
            details: record.details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestimonialDetails {
    pub name: String,
    pub designation: String,
    pub company: String,
    pub message: String,
    pub rating: u8,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: String,
    #[serde(flatten)]
    pub details: TestimonialDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTestimonial {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(flatten)]
    pub details: TestimonialDetails,
    #[serde(default)]
    pub is_active: bool,
}

impl From<ApiTestimonial> for Testimonial {
    fn from(record: ApiTestimonial) -> Self {
        Testimonial {
            id: record.id,
            details: record.details,
        }
    }
}

/// Editable file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub category: String,
    pub description: String,
    pub is_public: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub public_url: String,
    pub download_url: String,
    pub size: u64,
    pub mimetype: String,
    pub category: String,
    pub description: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFile {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub public_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub download_count: u64,
}

impl From<ApiFile> for FileData {
    fn from(record: ApiFile) -> Self {
        FileData {
            id: record.id,
            filename: record.filename,
            original_name: record.original_name,
            download_url: record.public_url.clone(),
            public_url: record.public_url,
            size: record.size,
            mimetype: record.mimetype,
            category: record.category,
            description: record.description,
            is_public: record.is_public,
            tags: record.tags,
            created_at: record.created_at,
        }
    }
}
