//! Shared gateway state.
//!
//! Built once from configuration and shared as an immutable snapshot. The
//! token buckets inside the limiter are the only state that changes after
//! startup.

use crate::config::{validate_config, ConfigError, GatewayConfig, InvalidConfig, OutageStatus};
use crate::identity::{build_verifier, IdentityPropagator, IdentityVerifier};
use crate::middleware::CorsPolicy;
use crate::proxy::{Backend, BackendForwarder};
use crate::rate_limit::RateLimiter;
use crate::routing::RouteTable;
use std::sync::Arc;
use std::time::Duration;
use turnstile_common_http::HttpClient;

pub struct GatewayState {
    pub routes: RouteTable,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub propagator: IdentityPropagator,
    pub forwarder: BackendForwarder,
    pub cors: CorsPolicy,
    pub global_tiers: Vec<String>,
    pub outage_status: OutageStatus,
    pub verifier_timeout: Duration,
    pub request_timeout: Duration,
    pub trust_forwarded_for: bool,
    pub sweep_interval: Duration,
}

impl GatewayState {
    /// Validate `config` and build the state it describes.
    ///
    /// Every configuration problem is reported together as [`InvalidConfig`].
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        validate_config(config).map_err(InvalidConfig)?;
        let routes = RouteTable::build(&config.routes).map_err(InvalidConfig)?;

        let propagator = IdentityPropagator::from_config(&config.identity)
            .map_err(|name| InvalidConfig(vec![ConfigError::InvalidHeaderName(name)]))?;
        let cors = CorsPolicy::from_config(&config.cors).map_err(|e| InvalidConfig(vec![e]))?;

        let client = HttpClient::new()?;
        let verifier = build_verifier(&config.verifier, &client)?;
        let forwarder = BackendForwarder::new(client, config.backends.iter().map(Backend::from));

        Ok(Self {
            routes,
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            verifier,
            propagator,
            forwarder,
            cors,
            global_tiers: config.rate_limit.global_tiers.clone(),
            outage_status: config.verifier.outage_status,
            verifier_timeout: config.verifier.timeout(),
            request_timeout: config.server.request_timeout(),
            trust_forwarded_for: config.server.trust_forwarded_for,
            sweep_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs),
        })
    }

    /// Replace the configured verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}
