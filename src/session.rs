// SPDX-License-Identifier: Apache-2.0
//! Session cookies and the per-request cookie capability.
//!
//! A browser is "logged in" when it carries both the upstream session token
//! (`connect.sid`) and the `user` marker. Neither value is interpreted here:
//! the token is an opaque upstream credential and the marker is whatever
//! JSON profile the login action stored.
//!
//! Values are read and written exactly as they appear on the wire. Inbound
//! cookies are never percent-decoded, so whatever a caller stores must
//! already be a valid cookie value (see [`is_cookie_safe`]).

use actix_web::cookie::time::{Duration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{self, HeaderMap};
use actix_web::{HttpRequest, HttpResponse};
use std::collections::HashMap;
use tracing::{debug, error};

/// Cookie carrying the upstream-issued session token
pub const SESSION_COOKIE: &str = "connect.sid";
/// Cookie carrying the JSON user profile
pub const USER_COOKIE: &str = "user";
/// Lifetime of both session cookies
pub const SESSION_TTL_DAYS: i64 = 30;

/// Login state derived once per request from cookie presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated,
}

impl SessionState {
    /// Both cookies must be present and non-empty.
    pub fn from_cookies(user: Option<&str>, session: Option<&str>) -> Self {
        let present = |value: Option<&str>| value.is_some_and(|v| !v.is_empty());
        if present(user) && present(session) {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == SessionState::Authenticated
    }
}

/// Whether `value` consists only of RFC 6265 cookie octets.
///
/// Whitespace, `"`, `,`, `;`, `\` and non-ASCII bytes are rejected, so
/// a safe value can never end early or smuggle in cookie attributes.
pub fn is_cookie_safe(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// Name/value pairs of every `Cookie` header, values untouched.
///
/// The first occurrence of a name wins, as it is the most specific one a
/// browser sends.
pub fn request_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    let pairs = headers
        .get_all(header::COOKIE)
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'));

    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if !name.is_empty() {
            cookies
                .entry(name.to_owned())
                .or_insert_with(|| value.trim().to_owned());
        }
    }
    cookies
}

/// Read/write access to the cookies of the request being handled.
///
/// Server-side code that needs the session token takes this as an explicit
/// parameter instead of reaching into ambient request state.
pub trait SessionContext {
    fn cookie(&self, name: &str) -> Option<String>;
    fn set_cookie(&mut self, name: &str, value: &str);
    fn remove_cookie(&mut self, name: &str);
}

/// Attributes applied to every session cookie we issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    /// Mark cookies `Secure` (production deployments behind HTTPS)
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Builds a site-wide, HTTP-only, lax cookie expiring in 30 days.
    pub fn build(&self, name: &str, value: &str) -> Cookie<'static> {
        Cookie::build(name.to_owned(), value.to_owned())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .expires(OffsetDateTime::now_utc() + Duration::days(SESSION_TTL_DAYS))
            .finish()
    }

    /// Builds the cookie that makes a browser drop `name`.
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = Cookie::build(name.to_owned(), "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}

/// Cookie view of one inbound request plus the mutations to send back.
///
/// Reads see pending mutations, so a cookie removed during handling is
/// absent for the rest of the request.
#[derive(Debug, Default)]
pub struct RequestSession {
    cookies: HashMap<String, String>,
    pending: Vec<Cookie<'static>>,
    policy: CookiePolicy,
}

impl RequestSession {
    pub fn from_request(req: &HttpRequest, policy: CookiePolicy) -> Self {
        let cookies = request_cookies(req.headers());
        debug!(count = cookies.len(), "Read request cookies");

        Self {
            cookies,
            pending: Vec::new(),
            policy,
        }
    }

    /// Session with a fixed set of incoming cookies.
    pub fn with_cookies<I, N, V>(cookies: I, policy: CookiePolicy) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
            pending: Vec::new(),
            policy,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_cookies(
            self.cookies.get(USER_COOKIE).map(String::as_str),
            self.cookies.get(SESSION_COOKIE).map(String::as_str),
        )
    }

    /// Cookies (including removals) queued for the response.
    pub fn pending(&self) -> &[Cookie<'static>] {
        &self.pending
    }

    /// Writes every queued cookie mutation onto `response`.
    pub fn finish(self, mut response: HttpResponse) -> HttpResponse {
        for cookie in &self.pending {
            if let Err(e) = response.add_cookie(cookie) {
                error!(cookie = %cookie.name(), error = %e, "Failed to attach cookie to response");
            }
        }
        response
    }

    fn queue(&mut self, cookie: Cookie<'static>) {
        self.pending.retain(|c| c.name() != cookie.name());
        self.pending.push(cookie);
    }
}

impl SessionContext for RequestSession {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set_cookie(&mut self, name: &str, value: &str) {
        if !is_cookie_safe(value) {
            error!(cookie = %name, "Refusing to issue cookie with unsafe characters in its value");
            return;
        }
        self.cookies.insert(name.to_owned(), value.to_owned());
        let cookie = self.policy.build(name, value);
        self.queue(cookie);
    }

    fn remove_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
        let cookie = self.policy.removal(name);
        self.queue(cookie);
    }
}
