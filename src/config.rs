// SPDX-License-Identifier: Apache-2.0
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::gate::GateConfig;
use crate::session::CookiePolicy;

/// Environment variable names
pub const CONFIG_PATH_ENV: &str = "ADMINGATE_CONFIG";
pub const API_BASE_URL_ENV: &str = "ADMINGATE_API_BASE_URL";
pub const BIND_ADDRESS_ENV: &str = "ADMINGATE_BIND";
pub const PRODUCTION_ENV: &str = "ADMINGATE_PRODUCTION";
pub const LOGIN_PATH_ENV: &str = "ADMINGATE_LOGIN_PATH";
pub const HOME_PATH_ENV: &str = "ADMINGATE_HOME_PATH";
pub const SUGGEST_URL_ENV: &str = "ADMINGATE_SUGGEST_URL";
pub const UPSTREAM_TIMEOUT_ENV: &str = "ADMINGATE_UPSTREAM_TIMEOUT_SECS";
pub const STATIC_DIR_ENV: &str = "ADMINGATE_STATIC_DIR";

/// Defaults
pub const DEFAULT_CONFIG_PATH: &str = "config/admingate.toml";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:7880";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the upstream REST API
    pub api_base_url: String,
    pub bind_address: String,
    /// Production mode marks cookies `Secure`
    pub production: bool,
    pub static_dir: PathBuf,
    pub upstream_timeout_secs: u64,
    /// Base URL of the tag-suggestion flows; suggestions are disabled without it
    pub suggest_url: Option<String>,
    pub gate: GateConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            production: false,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            suggest_url: None,
            gate: GateConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the TOML file (if any), then applies environment overrides.
    ///
    /// An explicitly configured file must exist; the default path is optional.
    pub fn load() -> Result<Self, ConfigError> {
        let (path, explicit) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = if explicit || path.exists() {
            Self::from_file(&path)?
        } else {
            info!(path = %path.display(), "No config file, using defaults and environment");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_BASE_URL_ENV) {
            self.api_base_url = url;
        }
        if let Some(bind) = lookup(BIND_ADDRESS_ENV) {
            self.bind_address = bind;
        }
        if let Some(production) = lookup(PRODUCTION_ENV) {
            self.production = matches!(production.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }
        if let Some(path) = lookup(LOGIN_PATH_ENV) {
            self.gate.login_path = path;
        }
        if let Some(path) = lookup(HOME_PATH_ENV) {
            self.gate.home_path = path;
        }
        if let Some(url) = lookup(SUGGEST_URL_ENV) {
            self.suggest_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(secs) = lookup(UPSTREAM_TIMEOUT_ENV) {
            match secs.parse() {
                Ok(secs) => self.upstream_timeout_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring unparseable {}", UPSTREAM_TIMEOUT_ENV),
            }
        }
        if let Some(dir) = lookup(STATIC_DIR_ENV) {
            self.static_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "upstream API base URL is not set (use {} or api_base_url)",
                API_BASE_URL_ENV
            )));
        }
        for (name, path) in [("login_path", &self.gate.login_path), ("home_path", &self.gate.home_path)] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!("{} must start with '/': {:?}", name, path)));
            }
        }
        if self.gate.login_path == self.gate.home_path {
            return Err(ConfigError::Invalid("login_path and home_path must differ".to_string()));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid("upstream_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::new(self.production)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
