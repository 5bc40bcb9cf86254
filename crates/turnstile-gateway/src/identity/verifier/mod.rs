//! Pluggable identity verification.

pub mod http;
pub mod jwt;

pub use self::http::HttpVerifier;
pub use self::jwt::JwtVerifier;

use super::types::VerifiedIdentity;
use crate::config::{VerifierConfig, VerifierMode};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use turnstile_common_http::HttpClient;

#[derive(Debug, Error)]
pub enum VerifyError {
    /// The credential was checked and refused.
    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("verifier timed out")]
    Timeout,

    /// The verifier could not give an answer.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Turns a bearer credential into an identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError>;

    /// Name used for the upstream in logs.
    fn name(&self) -> &'static str {
        "verifier"
    }
}

/// Build the configured verifier.
pub fn build_verifier(
    config: &VerifierConfig,
    client: &HttpClient,
) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match config.mode {
        VerifierMode::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| anyhow::anyhow!("http verifier requires an endpoint"))?;
            Ok(Arc::new(HttpVerifier::new(client.clone(), endpoint, config.timeout())))
        }
        VerifierMode::Jwt => {
            let secret = config
                .jwt_secret
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("jwt verifier requires a secret"))?;
            Ok(Arc::new(JwtVerifier::new(secret)))
        }
    }
}
