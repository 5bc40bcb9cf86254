//! Request context and dispatch states.

use crate::error::GatewayError;
use crate::identity::{CorrelationId, VerifiedIdentity};
use crate::routing::RouteRule;
use axum::{
    body::Body,
    http::{HeaderMap, Method},
};
use std::fmt;

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Classified,
    RateChecked,
    AuthChecked,
    Propagated,
    Forwarded,
    Responded,
    RejectedNotFound,
    RejectedRateLimited,
    RejectedUnauthenticated,
    RejectedForbidden,
    FailedUpstream,
    FailedTimeout,
}

impl DispatchState {
    /// Terminal state for a failure.
    pub fn for_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::NotFound => Self::RejectedNotFound,
            GatewayError::RateLimited { .. } => Self::RejectedRateLimited,
            GatewayError::Unauthenticated(_) => Self::RejectedUnauthenticated,
            GatewayError::Forbidden { .. } => Self::RejectedForbidden,
            GatewayError::UpstreamTimeout { .. } | GatewayError::DeadlineExceeded(_) => Self::FailedTimeout,
            GatewayError::UpstreamUnavailable { .. }
            | GatewayError::AuthServiceUnavailable { .. }
            | GatewayError::Internal(_) => Self::FailedUpstream,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::Received
                | Self::Classified
                | Self::RateChecked
                | Self::AuthChecked
                | Self::Propagated
                | Self::Forwarded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Classified => "CLASSIFIED",
            Self::RateChecked => "RATE_CHECKED",
            Self::AuthChecked => "AUTH_CHECKED",
            Self::Propagated => "PROPAGATED",
            Self::Forwarded => "FORWARDED",
            Self::Responded => "RESPONDED",
            Self::RejectedNotFound => "REJECTED_NOTFOUND",
            Self::RejectedRateLimited => "REJECTED_RATE_LIMITED",
            Self::RejectedUnauthenticated => "REJECTED_UNAUTHENTICATED",
            Self::RejectedForbidden => "REJECTED_FORBIDDEN",
            Self::FailedUpstream => "FAILED_UPSTREAM",
            Self::FailedTimeout => "FAILED_TIMEOUT",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one inbound request.
///
/// Owned by exactly one pipeline phase at a time and moved to the next.
#[derive(Debug)]
pub struct RequestContext<'a> {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Already sanitized.
    pub headers: HeaderMap,
    pub body: Body,
    /// Rate-limit key for the client; `"unknown"` when no address is known.
    pub client_key: String,
    pub client_ip: Option<String>,
    /// Address of the connected peer.
    pub peer_ip: Option<String>,
    pub correlation_id: CorrelationId,
    pub rule: Option<&'a RouteRule>,
    pub identity: Option<VerifiedIdentity>,
    pub state: DispatchState,
}

impl<'a> RequestContext<'a> {
    pub fn advance(mut self, state: DispatchState) -> Self {
        self.state = state;
        self
    }

    pub fn route_name(&self) -> &str {
        self.rule.map(|r| r.name.as_str()).unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_terminal_states() {
        assert!(!DispatchState::Received.is_terminal());
        assert!(!DispatchState::Forwarded.is_terminal());
        assert!(DispatchState::Responded.is_terminal());
        assert!(DispatchState::RejectedForbidden.is_terminal());
    }

    #[test]
    fn test_state_for_error() {
        assert_eq!(
            DispatchState::for_error(&GatewayError::RateLimited {
                tier: "auth".into(),
                retry_after: Duration::from_millis(200),
            }),
            DispatchState::RejectedRateLimited
        );
        assert_eq!(
            DispatchState::for_error(&GatewayError::UpstreamTimeout {
                upstream: "course-service".into(),
            }),
            DispatchState::FailedTimeout
        );
        assert_eq!(DispatchState::FailedTimeout.to_string(), "FAILED_TIMEOUT");
    }
}
