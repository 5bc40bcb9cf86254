//! Configuration validation.
//!
//! Every problem is collected rather than stopping at the first one, so an
//! operator sees the whole list in one failed start.

use super::types::{GatewayConfig, VerifierMode};
use crate::routing::RouteClass;
use axum::http::{HeaderName, Method};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Verifier mode is http but no endpoint is configured")]
    MissingVerifierEndpoint,

    #[error("Invalid verifier endpoint: {0}")]
    InvalidVerifierEndpoint(String),

    #[error("Invalid JWT secret: must be at least 32 characters")]
    InvalidJwtSecret,

    #[error("Verifier timeout ({verifier_ms}ms) must be shorter than the request budget ({budget_ms}ms)")]
    VerifierTimeoutTooLong { verifier_ms: u64, budget_ms: u64 },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid CORS setting: {0}")]
    InvalidCorsSetting(String),

    #[error("Invalid rate limit tier '{0}': rate and burst must be positive")]
    InvalidTier(String),

    #[error("Invalid rate limit sweep interval: must be at least 1 second")]
    InvalidSweepInterval,

    #[error("Invalid rate limit idle eviction: must be at least 1 second")]
    InvalidIdleEviction,

    #[error("Invalid rate limit key cap: must track at least one key")]
    InvalidMaxTrackedKeys,

    #[error("Duplicate rate limit tier '{0}'")]
    DuplicateTier(String),

    #[error("Duplicate backend '{0}'")]
    DuplicateBackend(String),

    #[error("Backend '{backend}' has an invalid URL: {url}")]
    InvalidBackendUrl { backend: String, url: String },

    #[error("Duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("Route '{route}' references unknown backend '{backend}'")]
    UnknownBackend { route: String, backend: String },

    #[error("Route '{route}' references unknown tier '{tier}'")]
    UnknownTier { route: String, tier: String },

    #[error("Route '{0}' declares no methods")]
    EmptyMethods(String),

    #[error("Route '{route}' declares invalid method '{method}'")]
    InvalidMethod { route: String, method: String },

    #[error("Route '{0}' is public but restricts roles")]
    RoleGatedPublicRoute(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Routes '{first}' and '{second}' overlap for the same method and path")]
    AmbiguousRoutes { first: String, second: String },

    #[error("Route '{route}' is unreachable: every request it matches is taken by '{by}'")]
    ShadowedRoute { route: String, by: String },
}

/// All problems found while loading configuration.
#[derive(Debug, Error)]
#[error("invalid configuration: {}", render(.0))]
pub struct InvalidConfig(pub Vec<ConfigError>);

fn render(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ConfigError>> for InvalidConfig {
    fn from(errors: Vec<ConfigError>) -> Self {
        Self(errors)
    }
}

/// Validate gateway configuration.
///
/// Route pattern overlap is checked separately when the route table is
/// compiled (see [`RouteTable::build`](crate::routing::RouteTable::build)).
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    validate_verifier(config, &mut errors);

    let identity = &config.identity;
    let header_names = [&identity.user_id_header, &identity.role_header, &identity.correlation_header]
        .into_iter()
        .chain(identity.extra_trusted_headers.iter());
    for name in header_names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ConfigError::InvalidHeaderName(name.clone()));
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.sweep_interval_secs == 0 {
        errors.push(ConfigError::InvalidSweepInterval);
    }
    if rate_limit.idle_eviction_secs == 0 {
        errors.push(ConfigError::InvalidIdleEviction);
    }
    if rate_limit.max_tracked_keys == 0 {
        errors.push(ConfigError::InvalidMaxTrackedKeys);
    }

    let mut tiers = HashSet::new();
    for tier in &rate_limit.tiers {
        if !(tier.rate_per_sec > 0.0 && tier.burst >= 1.0) {
            errors.push(ConfigError::InvalidTier(tier.name.clone()));
        }
        if !tiers.insert(tier.name.as_str()) {
            errors.push(ConfigError::DuplicateTier(tier.name.clone()));
        }
    }
    for tier in &rate_limit.global_tiers {
        if !tiers.contains(tier.as_str()) {
            errors.push(ConfigError::UnknownTier {
                route: "<global>".to_string(),
                tier: tier.clone(),
            });
        }
    }

    let mut backends = HashSet::new();
    for backend in &config.backends {
        if !backends.insert(backend.name.as_str()) {
            errors.push(ConfigError::DuplicateBackend(backend.name.clone()));
        }
        let parsed = reqwest::Url::parse(&backend.url);
        if !matches!(&parsed, Ok(url) if url.scheme() == "http" || url.scheme() == "https") {
            errors.push(ConfigError::InvalidBackendUrl {
                backend: backend.name.clone(),
                url: backend.url.clone(),
            });
        }
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        let name = route.name.clone().unwrap_or_else(|| route.pattern.clone());

        if !names.insert(name.clone()) {
            errors.push(ConfigError::DuplicateRoute(name.clone()));
        }
        if !backends.contains(route.backend.as_str()) {
            errors.push(ConfigError::UnknownBackend {
                route: name.clone(),
                backend: route.backend.clone(),
            });
        }
        for tier in &route.tiers {
            if !tiers.contains(tier.as_str()) {
                errors.push(ConfigError::UnknownTier {
                    route: name.clone(),
                    tier: tier.clone(),
                });
            }
        }
        if route.methods.is_empty() {
            errors.push(ConfigError::EmptyMethods(name.clone()));
        }
        for method in &route.methods {
            if Method::from_bytes(method.to_uppercase().as_bytes()).is_err() {
                errors.push(ConfigError::InvalidMethod {
                    route: name.clone(),
                    method: method.clone(),
                });
            }
        }
        if route.class == RouteClass::Public && !route.allowed_roles.is_empty() {
            errors.push(ConfigError::RoleGatedPublicRoute(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_verifier(config: &GatewayConfig, errors: &mut Vec<ConfigError>) {
    let verifier = &config.verifier;

    match verifier.mode {
        VerifierMode::Http => match &verifier.endpoint {
            None => errors.push(ConfigError::MissingVerifierEndpoint),
            Some(endpoint) if reqwest::Url::parse(endpoint).is_err() => {
                errors.push(ConfigError::InvalidVerifierEndpoint(endpoint.clone()))
            }
            Some(_) => {}
        },
        VerifierMode::Jwt => {
            let long_enough = verifier
                .jwt_secret
                .as_ref()
                .is_some_and(|secret| secret.len() >= 32);
            if !long_enough {
                errors.push(ConfigError::InvalidJwtSecret);
            }
        }
    }

    let budget_ms = config.server.request_timeout_secs.saturating_mul(1000);
    if verifier.timeout_ms >= budget_ms {
        errors.push(ConfigError::VerifierTimeoutTooLong {
            verifier_ms: verifier.timeout_ms,
            budget_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    #[test]
    fn test_valid_config() {
        let config = test_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = test_config();
        config.server.port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ConfigError::InvalidPort(0)));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = test_config();
        config.logging.level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_missing_verifier_endpoint() {
        let mut config = test_config();
        config.verifier.endpoint = None;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ConfigError::MissingVerifierEndpoint));
    }

    #[test]
    fn test_short_jwt_secret() {
        let mut config = test_config();
        config.verifier.mode = VerifierMode::Jwt;
        config.verifier.jwt_secret = Some("short".to_string());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ConfigError::InvalidJwtSecret));
    }

    #[test]
    fn test_verifier_timeout_must_fit_budget() {
        let mut config = test_config();
        config.server.request_timeout_secs = 2;
        config.verifier.timeout_ms = 2000;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::VerifierTimeoutTooLong { .. })));
    }

    #[test]
    fn test_zero_sweep_settings_rejected() {
        let mut config = test_config();
        config.rate_limit.sweep_interval_secs = 0;
        config.rate_limit.idle_eviction_secs = 0;
        config.rate_limit.max_tracked_keys = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ConfigError::InvalidSweepInterval,
                ConfigError::InvalidIdleEviction,
                ConfigError::InvalidMaxTrackedKeys,
            ]
        );
    }

    #[test]
    fn test_route_with_missing_tier_is_fatal() {
        let mut config = test_config();
        config.routes[0].tiers = vec!["nonexistent".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigError::UnknownTier {
                route: "login".to_string(),
                tier: "nonexistent".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_global_tier() {
        let mut config = test_config();
        config.rate_limit.global_tiers = vec!["everyone".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownTier { tier, .. } if tier == "everyone")));
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = test_config();
        config.routes[0].backend = "billing".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownBackend { .. })));
    }

    #[test]
    fn test_invalid_backend_url() {
        let mut config = test_config();
        config.backends[0].url = "not a url".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidBackendUrl { .. })));
    }

    #[test]
    fn test_invalid_tier_and_method_collected_together() {
        let mut config = test_config();
        config.rate_limit.tiers[0].rate_per_sec = 0.0;
        config.routes[0].methods = vec!["G E T".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_role_gated_public_route() {
        let mut config = test_config();
        config.routes[0].allowed_roles = vec!["admin".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ConfigError::RoleGatedPublicRoute("login".to_string())));
    }

    #[test]
    fn test_invalid_config_display_lists_all() {
        let err = InvalidConfig(vec![ConfigError::InvalidPort(0), ConfigError::InvalidJwtSecret]);
        let rendered = err.to_string();
        assert!(rendered.contains("Invalid port"));
        assert!(rendered.contains("JWT secret"));
    }

    #[test]
    fn test_invalid_identity_header() {
        let mut config = test_config();
        config.identity.role_header = "x user role".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ConfigError::InvalidHeaderName("x user role".to_string())));
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            verifier: VerifierConfig {
                endpoint: Some("http://auth-sidecar:8010/verify".to_string()),
                ..VerifierConfig::default()
            },
            backends: vec![BackendConfig {
                name: "user-service".to_string(),
                url: "http://user-service:8000".to_string(),
                timeout_ms: 5000,
            }],
            routes: vec![RouteConfig {
                name: Some("login".to_string()),
                pattern: "/api/auth/login".to_string(),
                methods: vec!["POST".to_string()],
                class: RouteClass::Public,
                backend: "user-service".to_string(),
                tiers: vec!["auth".to_string()],
                allowed_roles: Vec::new(),
                strip_prefix: None,
                timeout_ms: None,
            }],
            ..GatewayConfig::default()
        }
    }
}
