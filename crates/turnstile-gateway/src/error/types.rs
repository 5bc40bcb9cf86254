//! Gateway error types.

use crate::config::OutageStatus;
use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type for dispatcher phases.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Every way a request can fail at the dispatcher boundary.
///
/// The `Display` text carries detail for logs only; clients see
/// [`public_message`](GatewayError::public_message).
#[derive(Debug, Error)]
pub enum GatewayError {
    // 404
    #[error("No route for request")]
    NotFound,

    // 429
    #[error("Rate limit exceeded in tier '{tier}' (retry after {retry_after:?})")]
    RateLimited { tier: String, retry_after: Duration },

    // 401
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    // 403
    #[error("Role '{role}' is not allowed on route '{route}'")]
    Forbidden { route: String, role: String },

    // 502
    #[error("Upstream '{upstream}' unavailable: {detail}")]
    UpstreamUnavailable { upstream: String, detail: String },

    // 504
    #[error("Upstream '{upstream}' timed out")]
    UpstreamTimeout { upstream: String },

    #[error("Request exceeded its overall budget of {0:?}")]
    DeadlineExceeded(Duration),

    // 503 or 401 depending on policy
    #[error("Identity verifier unavailable: {detail}")]
    AuthServiceUnavailable { policy: OutageStatus, detail: String },

    // 500
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } | Self::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::AuthServiceUnavailable { policy, .. } => match policy {
                OutageStatus::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                OutageStatus::Unauthorized => StatusCode::UNAUTHORIZED,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind placed in the envelope.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::RateLimited { .. } => "RateLimited",
            Self::Unauthenticated(_) => "Unauthenticated",
            Self::Forbidden { .. } => "Forbidden",
            Self::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            Self::UpstreamTimeout { .. } | Self::DeadlineExceeded(_) => "UpstreamTimeout",
            Self::AuthServiceUnavailable { policy, .. } => match policy {
                OutageStatus::ServiceUnavailable => "ServiceUnavailable",
                OutageStatus::Unauthorized => "Unauthenticated",
            },
            Self::Internal(_) => "Internal",
        }
    }

    /// Fixed message safe to show clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound => "No route matches the request",
            Self::RateLimited { .. } => "Too many requests",
            Self::Unauthenticated(_) => "Authentication required",
            Self::Forbidden { .. } => "Insufficient permissions",
            Self::UpstreamUnavailable { .. } => "Upstream service unavailable",
            Self::UpstreamTimeout { .. } | Self::DeadlineExceeded(_) => "Upstream service timed out",
            Self::AuthServiceUnavailable { policy, .. } => match policy {
                OutageStatus::ServiceUnavailable => "Authentication service unavailable",
                OutageStatus::Unauthorized => "Authentication required",
            },
            Self::Internal(_) => "An internal error occurred",
        }
    }

    /// Whole seconds a client should wait, rounded up and never below one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(ceil_secs(*retry_after)),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Internal(err)
    }
}

fn ceil_secs(delay: Duration) -> u64 {
    let secs = delay.as_secs().saturating_add(u64::from(delay.subsec_nanos() > 0));
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Unauthenticated("expired".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::UpstreamUnavailable {
                upstream: "user-service".into(),
                detail: "refused".into(),
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::DeadlineExceeded(Duration::from_secs(30)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_outage_policy() {
        let unavailable = GatewayError::AuthServiceUnavailable {
            policy: OutageStatus::ServiceUnavailable,
            detail: "connect refused".into(),
        };
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.error_kind(), "ServiceUnavailable");

        let unauthorized = GatewayError::AuthServiceUnavailable {
            policy: OutageStatus::Unauthorized,
            detail: "connect refused".into(),
        };
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.error_kind(), "Unauthenticated");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = |ms| GatewayError::RateLimited {
            tier: "auth".into(),
            retry_after: Duration::from_millis(ms),
        };

        assert_eq!(err(200).retry_after_secs(), Some(1));
        assert_eq!(err(0).retry_after_secs(), Some(1));
        assert_eq!(err(1000).retry_after_secs(), Some(1));
        assert_eq!(err(1001).retry_after_secs(), Some(2));
        assert_eq!(GatewayError::NotFound.retry_after_secs(), None);

        let saturated = GatewayError::RateLimited {
            tier: "auth".into(),
            retry_after: Duration::MAX,
        };
        assert_eq!(saturated.retry_after_secs(), Some(u64::MAX));
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = GatewayError::UpstreamUnavailable {
            upstream: "course-service".into(),
            detail: "tcp connect error: 10.0.0.12:8002".into(),
        };

        assert!(err.to_string().contains("10.0.0.12"));
        assert!(!err.public_message().contains("10.0.0.12"));
    }
}
