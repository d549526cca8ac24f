// SPDX-License-Identifier: Apache-2.0
//! Client for the external tag-suggestion flows.
//!
//! Flows are invoked over HTTP as `POST {base}/{flow}` with body
//! `{"data": input}` and answer `{"result": output}`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::transport::{Transport, TransportError, UpstreamRequest};

pub const COURSE_TAGS_FLOW: &str = "suggestCourseTagsFlow";
pub const TESTIMONIAL_TAGS_FLOW: &str = "suggestTagsForTestimonialFlow";

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("tag suggestion service is not configured")]
    NotConfigured,
    #[error("nothing to suggest tags for")]
    EmptyInput,
    #[error("tag suggestion service answered {0}")]
    Service(StatusCode),
    #[error("tag suggestion service unreachable: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid tag suggestion response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ResponseError for SuggestError {
    fn status_code(&self) -> StatusCode {
        match self {
            SuggestError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            SuggestError::EmptyInput => StatusCode::BAD_REQUEST,
            SuggestError::Service(_) | SuggestError::Transport(_) | SuggestError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseTagsInput {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialTagsInput {
    pub testimonial_text: String,
}

#[derive(Debug, Serialize)]
struct FlowRequest<'a, I> {
    data: &'a I,
}

#[derive(Debug, Deserialize)]
struct FlowReply<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CourseTagsOutput {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestimonialTagsOutput {
    #[serde(default)]
    suggested_tags: Vec<String>,
}

pub struct TagSuggester<T> {
    transport: T,
    base_url: Option<String>,
}

impl<T: Transport> TagSuggester<T> {
    pub fn new(transport: T, base_url: Option<String>) -> Self {
        Self { transport, base_url }
    }

    #[instrument(skip_all, fields(chars = input.description.len()))]
    pub async fn course_tags(&self, input: &CourseTagsInput) -> Result<Vec<String>, SuggestError> {
        if input.description.trim().is_empty() {
            return Err(SuggestError::EmptyInput);
        }
        let output: CourseTagsOutput = self.run_flow(COURSE_TAGS_FLOW, input).await?;
        Ok(normalize_tags(output.tags))
    }

    #[instrument(skip_all, fields(chars = input.testimonial_text.len()))]
    pub async fn testimonial_tags(&self, input: &TestimonialTagsInput) -> Result<Vec<String>, SuggestError> {
        if input.testimonial_text.trim().is_empty() {
            return Err(SuggestError::EmptyInput);
        }
        let output: TestimonialTagsOutput = self.run_flow(TESTIMONIAL_TAGS_FLOW, input).await?;
        Ok(normalize_tags(output.suggested_tags))
    }

    async fn run_flow<I, O>(&self, flow: &str, input: &I) -> Result<O, SuggestError>
    where
        I: Serialize,
        O: for<'de> Deserialize<'de>,
    {
        let base_url = self.base_url.as_deref().ok_or(SuggestError::NotConfigured)?;
        let url = format!("{}/{}", base_url.trim_end_matches('/'), flow);
        let request = UpstreamRequest::post(url).json(&FlowRequest { data: input })?;

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(flow, status = %response.status, "Tag suggestion flow failed");
            return Err(SuggestError::Service(response.status));
        }

        let reply: FlowReply<O> = response.json()?;
        debug!(flow, "Tag suggestion flow answered");
        Ok(reply.result)
    }
}

/// Trims tags, drops empty ones and removes duplicates (case-insensitive),
/// keeping first occurrences in order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}
