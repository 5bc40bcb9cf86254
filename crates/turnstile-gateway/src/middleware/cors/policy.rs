//! Compiled CORS policy.

use crate::config::{ConfigError, CorsConfig};
use axum::http::HeaderValue;
use std::collections::HashSet;

/// Allowed origins configuration.
#[derive(Debug, Clone)]
pub enum AllowedOrigins {
    /// Allow any origin.
    Any,
    /// Allow specific origins.
    List(HashSet<String>),
}

impl AllowedOrigins {
    pub fn from_list(origins: &[String]) -> Self {
        if origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins.iter().map(|o| o.trim_end_matches('/').to_string()).collect())
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }
}

/// CORS settings with header values prepared once at startup.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub enabled: bool,
    pub origins: AllowedOrigins,
    pub allow_methods: HeaderValue,
    pub allow_headers: HeaderValue,
    pub expose_headers: Option<HeaderValue>,
    pub allow_credentials: bool,
    pub max_age: HeaderValue,
    pub path_prefixes: Vec<String>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, ConfigError> {
        let joined = |values: &[String]| -> Result<HeaderValue, ConfigError> {
            let text = values.join(", ");
            HeaderValue::from_str(&text).map_err(|_| ConfigError::InvalidCorsSetting(text))
        };

        let origins = AllowedOrigins::from_list(&config.allowed_origins);
        if config.allow_credentials && matches!(origins, AllowedOrigins::Any) {
            return Err(ConfigError::InvalidCorsSetting(
                "allow_credentials cannot be combined with allowed_origins = \"*\"".to_string(),
            ));
        }

        let expose_headers = if config.exposed_headers.is_empty() {
            None
        } else {
            Some(joined(&config.exposed_headers)?)
        };

        Ok(Self {
            enabled: config.enabled,
            origins,
            allow_methods: joined(&config.allowed_methods)?,
            allow_headers: joined(&config.allowed_headers)?,
            expose_headers,
            allow_credentials: config.allow_credentials,
            max_age: HeaderValue::from(config.max_age_secs),
            path_prefixes: config.path_prefixes.clone(),
        })
    }

    /// Whether the policy covers `path` at all.
    pub fn applies_to(&self, path: &str) -> bool {
        self.enabled && self.path_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.origins.is_allowed(origin)
    }

    /// Value for `Access-Control-Allow-Origin`.
    pub fn allow_origin_value(&self, origin: &HeaderValue) -> HeaderValue {
        match self.origins {
            AllowedOrigins::Any => HeaderValue::from_static("*"),
            AllowedOrigins::List(_) => origin.clone(),
        }
    }
}
