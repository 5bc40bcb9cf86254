//! Route rules.

use super::pattern::PathPattern;
use crate::config::{ConfigError, RouteConfig};
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether a route requires a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Public,
    Protected,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
        }
    }
}

/// A compiled route rule. Immutable once the table is built.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: String,
    pub pattern: PathPattern,
    pub methods: Vec<Method>,
    pub class: RouteClass,
    pub backend: String,
    pub tiers: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub strip_prefix: Option<String>,
    pub timeout: Option<Duration>,
}

impl RouteRule {
    pub fn from_config(config: &RouteConfig) -> Result<Self, ConfigError> {
        let pattern = PathPattern::parse(&config.pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: config.pattern.clone(),
            reason: e.to_string(),
        })?;
        let name = config.name.clone().unwrap_or_else(|| config.pattern.clone());

        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|_| ConfigError::InvalidMethod {
                    route: name.clone(),
                    method: m.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            pattern,
            methods,
            class: config.class,
            backend: config.backend.clone(),
            tiers: config.tiers.clone(),
            allowed_roles: config.allowed_roles.clone(),
            strip_prefix: config.strip_prefix.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.methods.contains(method) && self.pattern.matches(path)
    }

    pub fn is_protected(&self) -> bool {
        self.class == RouteClass::Protected
    }

    /// Whether `role` may use this route. Unrestricted routes admit any role.
    pub fn permits_role(&self, role: &str) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.iter().any(|r| r == role)
    }

    pub(crate) fn shares_method_with(&self, other: &RouteRule) -> bool {
        self.methods.iter().any(|m| other.methods.contains(m))
    }

    pub(crate) fn has_all_methods_of(&self, other: &RouteRule) -> bool {
        other.methods.iter().all(|m| self.methods.contains(m))
    }
}
