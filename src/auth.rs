// SPDX-License-Identifier: Apache-2.0
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::api::{api_url, LOGIN_ENDPOINT};
use crate::session::{is_cookie_safe, SessionContext, SESSION_COOKIE, USER_COOKIE};
use crate::transport::{Transport, TransportError, UpstreamRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    #[serde(default)]
    user: serde_json::Value,
    session_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("{0}")]
    Rejected(String),
    #[error("Login succeeded but upstream issued no session")]
    MissingSession,
    #[error("Login succeeded but upstream returned no user")]
    MissingUser,
    #[error("upstream unreachable: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid login response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ResponseError for LoginError {
    fn status_code(&self) -> StatusCode {
        match self {
            LoginError::Rejected(_) | LoginError::MissingSession | LoginError::MissingUser => StatusCode::UNAUTHORIZED,
            LoginError::Transport(_) | LoginError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

/// Authenticates against upstream and stores the session cookies.
///
/// The session token comes from upstream's `Set-Cookie: connect.sid=...`,
/// or from `sessionId` in the reply body, and is stored as issued. The
/// profile is stored percent-encoded in the `user` cookie. Returns the
/// user profile.
#[instrument(skip(transport, session, credentials), fields(email = %credentials.email))]
pub async fn login<T, S>(transport: &T, session: &mut S, base_url: &str, credentials: &Credentials) -> Result<serde_json::Value, LoginError>
where
    T: Transport,
    S: SessionContext + ?Sized,
{
    let request = UpstreamRequest::post(api_url(base_url, LOGIN_ENDPOINT)).json(credentials)?;
    let response = transport.send(request).await?;

    let reply = match response.json::<LoginReply>() {
        Ok(reply) => reply,
        Err(_) if !response.is_success() => {
            return Err(LoginError::Rejected("Login failed".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if !response.is_success() || !reply.success {
        let message = reply.message.unwrap_or_else(|| "Login failed".to_string());
        warn!(status = %response.status, "Upstream rejected login");
        return Err(LoginError::Rejected(message));
    }

    if !reply.user.is_object() {
        warn!("Upstream accepted login without a user profile");
        return Err(LoginError::MissingUser);
    }

    let token = response
        .set_cookie_value(SESSION_COOKIE)
        .or(reply.session_id)
        .filter(|token| !token.is_empty() && is_cookie_safe(token))
        .ok_or(LoginError::MissingSession)?;

    session.set_cookie(SESSION_COOKIE, &token);
    session.set_cookie(USER_COOKIE, &encode_user_marker(&reply.user)?);
    info!("User logged in");

    Ok(reply.user)
}

/// Serialises the profile into a `user` cookie value.
pub fn encode_user_marker(user: &serde_json::Value) -> Result<String, serde_json::Error> {
    Ok(urlencoding::encode(&serde_json::to_string(user)?).into_owned())
}

/// Reads back a profile stored by [`encode_user_marker`].
pub fn decode_user_marker(value: &str) -> Option<serde_json::Value> {
    let json = urlencoding::decode(value).ok()?;
    serde_json::from_str(&json).ok()
}

/// Clears both session cookies.
pub fn logout<S: SessionContext + ?Sized>(session: &mut S) {
    session.remove_cookie(SESSION_COOKIE);
    session.remove_cookie(USER_COOKIE);
    info!("User logged out");
}
