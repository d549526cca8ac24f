// SPDX-License-Identifier: Apache-2.0
//! Access decision for inbound requests.
//!
//! The gate trusts cookie presence as a liveness proxy and never asks the
//! upstream API. A stale cookie is corrected later by the forwarder, which
//! drops the session token when upstream answers 401.

use serde::Deserialize;

use crate::session::SessionState;

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";

/// Path prefixes that bypass the gate entirely.
pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "/api",
    "/_next/static",
    "/_next/image",
    "/static",
    "/favicon.ico",
    "/health",
];

/// Outcome of evaluating the gate for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
}

/// Prefix list of paths excluded from the gate.
///
/// Matching is a plain prefix test, so `/api` also covers `/apiary`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOW_LIST.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Where unauthenticated requests are sent
    pub login_path: String,
    /// Where authenticated visitors of the login page are sent
    pub home_path: String,
    pub allow_list: AllowList,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            allow_list: AllowList::default(),
        }
    }
}

impl GateConfig {
    pub fn redirect_target(&self, decision: GateDecision) -> Option<&str> {
        match decision {
            GateDecision::Allow => None,
            GateDecision::RedirectToLogin => Some(&self.login_path),
            GateDecision::RedirectToHome => Some(&self.home_path),
        }
    }
}

/// Decides whether a request for `path` may proceed.
pub fn decide(path: &str, state: SessionState, config: &GateConfig) -> GateDecision {
    if config.allow_list.matches(path) {
        return GateDecision::Allow;
    }

    let on_login_page = path == config.login_path;
    match state {
        SessionState::Authenticated if on_login_page => GateDecision::RedirectToHome,
        SessionState::Unauthenticated if !on_login_page => GateDecision::RedirectToLogin,
        _ => GateDecision::Allow,
    }
}
