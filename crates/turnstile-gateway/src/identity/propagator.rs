//! Trusted header handling.
//!
//! Backends trust the identity headers implicitly, so every client-supplied
//! copy is removed before routing and only the gateway writes them back.

use super::types::{CorrelationId, VerifiedIdentity};
use crate::config::IdentityConfig;
use crate::error::GatewayError;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

#[derive(Debug, Clone)]
pub struct IdentityPropagator {
    user_id_header: HeaderName,
    role_header: HeaderName,
    correlation_header: HeaderName,
    /// Every name stripped from inbound requests.
    sanitized: Vec<HeaderName>,
}

impl IdentityPropagator {
    /// Header names are checked by config validation; an invalid one here is
    /// reported as the offending name.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, String> {
        let parse = |name: &String| HeaderName::from_bytes(name.as_bytes()).map_err(|_| name.clone());

        let user_id_header = parse(&config.user_id_header)?;
        let role_header = parse(&config.role_header)?;
        let correlation_header = parse(&config.correlation_header)?;

        let mut sanitized = vec![
            user_id_header.clone(),
            role_header.clone(),
            correlation_header.clone(),
        ];
        for extra in &config.extra_trusted_headers {
            let name = parse(extra)?;
            if !sanitized.contains(&name) {
                sanitized.push(name);
            }
        }

        Ok(Self {
            user_id_header,
            role_header,
            correlation_header,
            sanitized,
        })
    }

    pub fn correlation_header(&self) -> &HeaderName {
        &self.correlation_header
    }

    pub fn sanitized_headers(&self) -> &[HeaderName] {
        &self.sanitized
    }

    /// Remove every trusted header, whatever the route turns out to be.
    pub fn sanitize(&self, headers: &mut HeaderMap) {
        for name in &self.sanitized {
            headers.remove(name);
        }
    }

    /// Set identity and correlation headers for a protected route.
    pub fn attach(
        &self,
        headers: &mut HeaderMap,
        identity: &VerifiedIdentity,
        correlation_id: &CorrelationId,
    ) -> Result<(), GatewayError> {
        headers.insert(self.user_id_header.clone(), header_value(&identity.subject_id)?);
        headers.insert(self.role_header.clone(), header_value(&identity.role)?);
        self.attach_correlation(headers, correlation_id);
        Ok(())
    }

    /// Set the correlation header only.
    pub fn attach_correlation(&self, headers: &mut HeaderMap, correlation_id: &CorrelationId) {
        // UUID text is always a valid header value.
        if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
            headers.insert(self.correlation_header.clone(), value);
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(value).map_err(|_| {
        GatewayError::Internal(anyhow::anyhow!("verified identity is not a valid header value"))
    })
}

/// Extract the bearer credential from `Authorization`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| GatewayError::Unauthenticated("missing Authorization header".into()))?;

    let malformed = || GatewayError::Unauthenticated("malformed Authorization header".into());
    let value = value.to_str().map_err(|_| malformed())?;

    let (scheme, token) = value.split_once(' ').ok_or_else(malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(malformed());
    }

    Ok(token)
}
