// SPDX-License-Identifier: Apache-2.0
//! Outbound HTTP to the upstream API.
//!
//! `Transport` is the seam between request-building code and the network;
//! production uses `AwcTransport`, tests substitute a recording fake.

use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::web::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Largest upstream body we are willing to buffer
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to reach upstream: {0}")]
    Send(String),
    #[error("failed to read upstream response body: {0}")]
    Body(String),
}

/// Request to be issued against the upstream API.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets a JSON body and its content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Sets a raw body, keeping the caller's content type if given.
    pub fn body(mut self, content_type: Option<HeaderValue>, body: Bytes) -> Self {
        if let Some(content_type) = content_type {
            self.headers.insert(header::CONTENT_TYPE, content_type);
        }
        self.body = Some(body);
        self
    }
}

/// Buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Value of cookie `name` from any `Set-Cookie` header.
    pub fn set_cookie_value(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .filter_map(|v| v.to_str().ok())
            .find_map(|set_cookie| {
                let pair = set_cookie.split(';').next()?;
                let (cookie_name, value) = pair.split_once('=')?;
                (cookie_name.trim() == name && !value.trim().is_empty())
                    .then(|| value.trim().to_string())
            })
    }
}

pub trait Transport {
    fn send(
        &self,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>>;
}

/// awc-backed transport; one instance per worker.
#[derive(Clone)]
pub struct AwcTransport {
    client: awc::Client,
    body_limit: usize,
}

impl AwcTransport {
    pub fn new(timeout: Duration) -> Self {
        let connector = awc::Connector::new()
            .timeout(Duration::from_secs(10))
            .conn_keep_alive(Duration::from_secs(15))
            .disconnect_timeout(Duration::from_secs(2));

        let client = awc::ClientBuilder::new()
            .timeout(timeout)
            .connector(connector)
            .finish();

        Self {
            client,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }
}

impl Transport for AwcTransport {
    #[instrument(name = "upstream", skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let UpstreamRequest { method, url, headers, body } = request;

        let mut outbound = self.client.request(method, url.as_str());
        for (name, value) in headers.iter() {
            outbound = outbound.append_header((name.clone(), value.clone()));
        }

        let pending = match body {
            Some(body) => outbound.send_body(body),
            None => outbound.send(),
        };

        let mut response = pending.await.map_err(|e| {
            error!(error = %e, "Upstream request failed");
            TransportError::Send(e.to_string())
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.body().limit(self.body_limit).await.map_err(|e| {
            error!(error = %e, "Failed to read upstream response body");
            TransportError::Body(e.to_string())
        })?;

        debug!(status = %status, bytes = body.len(), "Received upstream response");

        Ok(UpstreamResponse { status, headers, body })
    }
}
