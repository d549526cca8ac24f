// SPDX-License-Identifier: Apache-2.0
//! Typed access to the upstream REST API through the forwarder.

use actix_web::http::StatusCode;
use actix_web::http::header::HeaderValue;
use actix_web::web::Bytes;
use actix_web::{HttpResponse, ResponseError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::forwarder::{ForwardError, Forwarder};
use crate::models::{ApiCourse, ApiFile, ApiTestimonial, Course, CourseDetails, FileData, FileMetadata, Testimonial, TestimonialDetails};
use crate::session::SessionContext;
use crate::transport::{Transport, TransportError, UpstreamRequest, UpstreamResponse};

pub const COURSES_ENDPOINT: &str = "/api/courses";
pub const TESTIMONIALS_ENDPOINT: &str = "/api/testimonials";
pub const FILES_ENDPOINT: &str = "/api/files";
pub const LOGIN_ENDPOINT: &str = "/api/auth/login";

/// Joins the configured base URL and an endpoint, adding the leading `/`.
pub fn api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// `{ success, data, message }` wrapper used by every upstream endpoint
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required. Please login first.")]
    AuthenticationRequired,
    #[error("Session expired or invalid. Please login again.")]
    UpstreamUnauthorized,
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
    #[error("invalid record id: {0:?}")]
    InvalidId(String),
    #[error("upstream unreachable: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ForwardError> for ApiError {
    fn from(e: ForwardError) -> Self {
        match e {
            ForwardError::AuthenticationRequired => ApiError::AuthenticationRequired,
            ForwardError::Transport(e) => ApiError::Transport(e),
        }
    }
}

impl ApiError {
    /// Whether the caller should send the user back to the login page.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired | ApiError::UpstreamUnauthorized)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired | ApiError::UpstreamUnauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } if status.is_client_error() || status.is_server_error() => *status,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::Transport(_) | ApiError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

/// Turns a forwarded response into the envelope payload.
///
/// A 401 maps to `UpstreamUnauthorized`; other failures carry upstream's
/// `message` when it sent one, else `fallback`.
pub fn read_envelope<T: DeserializeOwned>(response: &UpstreamResponse, fallback: &str) -> Result<Option<T>, ApiError> {
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::UpstreamUnauthorized);
    }

    if !response.is_success() {
        let message = response
            .json::<ApiEnvelope<serde_json::Value>>()
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| fallback.to_string());
        return Err(ApiError::Upstream { status: response.status, message });
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let envelope: ApiEnvelope<T> = response.json()?;
    if !envelope.success {
        return Err(ApiError::Upstream {
            status: response.status,
            message: envelope.message.unwrap_or_else(|| fallback.to_string()),
        });
    }
    Ok(envelope.data)
}

/// A collection exposed by the upstream API.
pub trait Resource {
    const ENDPOINT: &'static str;
    /// Human-readable name used in error messages
    const NAME: &'static str;
    /// Upstream representation
    type Record: DeserializeOwned;
    /// Payload for create and update
    type Draft: Serialize;
    /// Admin-facing representation
    type Item: Serialize + From<Self::Record>;
}

pub struct Courses;
pub struct Testimonials;
pub struct Files;

impl Resource for Courses {
    const ENDPOINT: &'static str = COURSES_ENDPOINT;
    const NAME: &'static str = "course";
    type Record = ApiCourse;
    type Draft = CourseDetails;
    type Item = Course;
}

impl Resource for Testimonials {
    const ENDPOINT: &'static str = TESTIMONIALS_ENDPOINT;
    const NAME: &'static str = "testimonial";
    type Record = ApiTestimonial;
    type Draft = TestimonialDetails;
    type Item = Testimonial;
}

impl Resource for Files {
    const ENDPOINT: &'static str = FILES_ENDPOINT;
    const NAME: &'static str = "file";
    type Record = ApiFile;
    type Draft = FileMetadata;
    type Item = FileData;
}

/// Record ids become path segments, so only URL-safe ids are accepted.
fn validate_id(id: &str) -> Result<&str, ApiError> {
    let valid = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && id != "."
        && id != "..";
    if valid { Ok(id) } else { Err(ApiError::InvalidId(id.to_string())) }
}

/// Item counts shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub courses: usize,
    pub featured_courses: usize,
    pub testimonials: usize,
    pub files: usize,
}

pub struct ApiClient<T> {
    forwarder: Forwarder<T>,
    base_url: String,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(forwarder: Forwarder<T>, base_url: impl Into<String>) -> Self {
        Self {
            forwarder,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url<R: Resource>(&self) -> String {
        api_url(&self.base_url, R::ENDPOINT)
    }

    fn item_url<R: Resource>(&self, id: &str) -> Result<String, ApiError> {
        Ok(format!("{}/{}", self.collection_url::<R>(), validate_id(id)?))
    }

    #[instrument(skip_all, fields(resource = R::NAME))]
    pub async fn list<R, S>(&self, session: &mut S) -> Result<Vec<R::Item>, ApiError>
    where
        R: Resource,
        S: SessionContext + ?Sized,
    {
        let request = UpstreamRequest::get(self.collection_url::<R>());
        let response = self.forwarder.forward(session, request).await?;
        let fallback = format!("Failed to fetch {}s", R::NAME);
        let records: Vec<R::Record> = read_envelope(&response, &fallback)?.unwrap_or_default();
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[instrument(skip_all, fields(resource = R::NAME))]
    pub async fn create<R, S>(&self, session: &mut S, draft: &R::Draft) -> Result<R::Item, ApiError>
    where
        R: Resource,
        S: SessionContext + ?Sized,
    {
        let request = UpstreamRequest::post(self.collection_url::<R>()).json(draft)?;
        let response = self.forwarder.forward(session, request).await?;
        let fallback = format!("Failed to add {}", R::NAME);
        into_item::<R>(read_envelope(&response, &fallback)?, &fallback)
    }

    #[instrument(skip_all, fields(resource = R::NAME, id = %id))]
    pub async fn update<R, S>(&self, session: &mut S, id: &str, draft: &R::Draft) -> Result<R::Item, ApiError>
    where
        R: Resource,
        S: SessionContext + ?Sized,
    {
        let request = UpstreamRequest::put(self.item_url::<R>(id)?).json(draft)?;
        let response = self.forwarder.forward(session, request).await?;
        let fallback = format!("Failed to update {}", R::NAME);
        into_item::<R>(read_envelope(&response, &fallback)?, &fallback)
    }

    #[instrument(skip_all, fields(resource = R::NAME, id = %id))]
    pub async fn delete<R, S>(&self, session: &mut S, id: &str) -> Result<(), ApiError>
    where
        R: Resource,
        S: SessionContext + ?Sized,
    {
        let request = UpstreamRequest::delete(self.item_url::<R>(id)?);
        let response = self.forwarder.forward(session, request).await?;
        let fallback = format!("Failed to delete {}", R::NAME);
        read_envelope::<serde_json::Value>(&response, &fallback)?;
        Ok(())
    }

    /// Forwards an already-encoded multipart upload body.
    #[instrument(skip_all, fields(bytes = body.len()))]
    pub async fn upload_file<S>(&self, session: &mut S, content_type: Option<HeaderValue>, body: Bytes) -> Result<FileData, ApiError>
    where
        S: SessionContext + ?Sized,
    {
        let request = UpstreamRequest::post(self.collection_url::<Files>()).body(content_type, body);
        let response = self.forwarder.forward(session, request).await?;
        let fallback = "Failed to upload file";
        into_item::<Files>(read_envelope(&response, fallback)?, fallback)
    }

    /// Counts for the dashboard.
    ///
    /// A lost session aborts the summary; any other failure on one
    /// collection is logged and counted as empty.
    pub async fn dashboard<S>(&self, session: &mut S) -> Result<DashboardSummary, ApiError>
    where
        S: SessionContext + ?Sized,
    {
        let courses = tolerate(self.list::<Courses, S>(session).await)?;
        let testimonials = tolerate(self.list::<Testimonials, S>(session).await)?;
        let files = tolerate(self.list::<Files, S>(session).await)?;

        Ok(DashboardSummary {
            courses: courses.len(),
            featured_courses: courses.iter().filter(|c| c.details.is_featured).count(),
            testimonials: testimonials.len(),
            files: files.len(),
        })
    }
}

fn into_item<R: Resource>(record: Option<R::Record>, fallback: &str) -> Result<R::Item, ApiError> {
    record.map(Into::into).ok_or_else(|| ApiError::Upstream {
        status: StatusCode::BAD_GATEWAY,
        message: fallback.to_string(),
    })
}

fn tolerate<V>(result: Result<Vec<V>, ApiError>) -> Result<Vec<V>, ApiError> {
    match result {
        Err(e) if e.requires_login() => Err(e),
        Err(e) => {
            warn!(error = %e, "Dashboard collection unavailable");
            Ok(Vec::new())
        }
        ok => ok,
    }
}
