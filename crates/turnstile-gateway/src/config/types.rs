//! Gateway configuration types.

use crate::rate_limit::KeyStrategy;
use crate::routing::RouteClass;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main gateway configuration.
///
/// Loaded once at startup and compiled into an immutable
/// [`GatewayState`](crate::state::GatewayState); never mutated while requests
/// are in flight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Identity verifier configuration.
    #[serde(default)]
    pub verifier: VerifierConfig,
    /// Trusted header names.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// CORS preflight policy.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Backend services.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Ordered route table (first match wins).
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overall budget for one request, verifier and backend included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Take the client address from `X-Forwarded-For` (only behind a trusted
    /// load balancer).
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl ServerBindConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Which verifier implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierMode {
    /// Call the external verification service.
    #[default]
    Http,
    /// Verify HS256 tokens in-process.
    Jwt,
}

/// Client-visible status when the verifier is down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageStatus {
    #[default]
    ServiceUnavailable,
    Unauthorized,
}

/// Identity verifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default)]
    pub mode: VerifierMode,
    /// Verification endpoint (http mode).
    pub endpoint: Option<String>,
    /// Verifier deadline, independent of backend timeouts.
    #[serde(default = "default_verifier_timeout")]
    pub timeout_ms: u64,
    /// HS256 secret (jwt mode).
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub outage_status: OutageStatus,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: VerifierMode::default(),
            endpoint: None,
            timeout_ms: default_verifier_timeout(),
            jwt_secret: None,
            outage_status: OutageStatus::default(),
        }
    }
}

fn default_verifier_timeout() -> u64 {
    2000
}

impl VerifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Names of the headers only the gateway may set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
    #[serde(default = "default_role_header")]
    pub role_header: String,
    /// Other claim-derived headers that are always stripped.
    #[serde(default = "default_extra_trusted_headers")]
    pub extra_trusted_headers: Vec<String>,
    #[serde(default = "default_correlation_header")]
    pub correlation_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id_header: default_user_id_header(),
            role_header: default_role_header(),
            extra_trusted_headers: default_extra_trusted_headers(),
            correlation_header: default_correlation_header(),
        }
    }
}

fn default_user_id_header() -> String {
    "x-user-id".to_string()
}

fn default_role_header() -> String {
    "x-user-role".to_string()
}

fn default_extra_trusted_headers() -> Vec<String> {
    vec!["x-auth-user-id".to_string(), "x-auth-user-role".to_string()]
}

fn default_correlation_header() -> String {
    "x-request-id".to_string()
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allowed origins; `"*"` allows any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_cors_exposed")]
    pub exposed_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    /// Max age for preflight cache.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
    /// Path prefixes the policy applies to.
    #[serde(default = "default_cors_paths")]
    pub path_prefixes: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
            exposed_headers: default_cors_exposed(),
            allow_credentials: false,
            max_age_secs: default_cors_max_age(),
            path_prefixes: default_cors_paths(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cors_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "PATCH", "DELETE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cors_headers() -> Vec<String> {
    ["Content-Type", "Authorization", "Accept"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cors_exposed() -> Vec<String> {
    ["X-Request-ID", "Retry-After"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cors_max_age() -> u64 {
    86400
}

fn default_cors_paths() -> Vec<String> {
    vec!["/api/".to_string()]
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Buckets untouched for this long are evicted.
    #[serde(default = "default_idle_eviction")]
    pub idle_eviction_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Hard cap on tracked buckets; least recently used go first.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
    /// Tiers applied to every routed request.
    #[serde(default)]
    pub global_tiers: Vec<String>,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            idle_eviction_secs: default_idle_eviction(),
            sweep_interval_secs: default_sweep_interval(),
            max_tracked_keys: default_max_tracked_keys(),
            global_tiers: Vec::new(),
            tiers: default_tiers(),
        }
    }
}

fn default_idle_eviction() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_tracked_keys() -> usize {
    100_000
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new("auth", 5.0, 5.0, KeyStrategy::ClientIp),
        TierConfig::new("refresh", 2.0, 2.0, KeyStrategy::ClientIp),
        TierConfig::new("protected", 30.0, 60.0, KeyStrategy::ClientIp),
    ]
}

/// A named rate-limit tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    /// Sustained rate in requests per second.
    pub rate_per_sec: f64,
    /// Bucket capacity.
    pub burst: f64,
    #[serde(default)]
    pub key: KeyStrategy,
}

impl TierConfig {
    pub fn new(name: &str, rate_per_sec: f64, burst: f64, key: KeyStrategy) -> Self {
        Self {
            name: name.to_string(),
            rate_per_sec,
            burst,
            key,
        }
    }
}

/// A backend service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    /// Base URL, e.g. `http://user-service:8000`.
    pub url: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_backend_timeout() -> u64 {
    10_000
}

/// One entry of the route table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Name used in logs and as a rate-limit key; defaults to the pattern.
    pub name: Option<String>,
    pub pattern: String,
    pub methods: Vec<String>,
    pub class: RouteClass,
    pub backend: String,
    #[serde(default)]
    pub tiers: Vec<String>,
    /// Roles allowed on a protected route; empty means any verified identity.
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    /// Prefix removed from the path before forwarding.
    pub strip_prefix: Option<String>,
    /// Overrides the backend timeout for this route.
    pub timeout_ms: Option<u64>,
}
