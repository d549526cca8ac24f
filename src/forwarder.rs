// SPDX-License-Identifier: Apache-2.0
use actix_web::http::{header, StatusCode};
use actix_web::http::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::session::{SessionContext, SESSION_COOKIE};
use crate::transport::{Transport, TransportError, UpstreamRequest, UpstreamResponse};

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// No session token to attach; upstream was not contacted
    #[error("Authentication required. Please login first.")]
    AuthenticationRequired,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Sends requests to the upstream API on behalf of the logged-in user.
///
/// The session token is attached as a `connect.sid` cookie. A `401` from
/// upstream deletes the local token, so the access gate forces a fresh
/// login on the next navigation. Every response, whatever its status, is
/// handed back unchanged; only a missing token is an error.
#[derive(Debug, Clone)]
pub struct Forwarder<T> {
    transport: T,
}

impl<T: Transport> Forwarder<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[instrument(name = "forward", skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn forward<S>(&self, session: &mut S, mut request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError>
    where
        S: SessionContext + ?Sized,
    {
        let Some(token) = session.cookie(SESSION_COOKIE).filter(|t| !t.is_empty()) else {
            warn!("No session cookie found, refusing to contact upstream");
            return Err(ForwardError::AuthenticationRequired);
        };

        let cookie_header = match HeaderValue::from_str(&merge_cookie_header(&request.headers, &token)) {
            Ok(value) => value,
            Err(_) => {
                warn!("Session cookie cannot be sent as a header value");
                return Err(ForwardError::AuthenticationRequired);
            }
        };
        request.headers.insert(header::COOKIE, cookie_header);

        debug!("Forwarding request with session cookie");
        let response = self.transport.send(request).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            warn!("Upstream rejected session, clearing local session cookie");
            session.remove_cookie(SESSION_COOKIE);
        }

        Ok(response)
    }
}

/// Caller-supplied cookies with our session token appended.
///
/// Any `connect.sid` pair the caller already set is replaced.
fn merge_cookie_header(headers: &HeaderMap, token: &str) -> String {
    let mut pairs: Vec<String> = headers
        .get_all(header::COOKIE)
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let name = parts.next()?.trim();
            let val = parts.next().unwrap_or("").trim();
            if name.is_empty() || name == SESSION_COOKIE {
                None
            } else {
                Some(format!("{}={}", name, val))
            }
        })
        .collect();

    pairs.push(format!("{}={}", SESSION_COOKIE, token));
    pairs.join("; ")
}
