//! Relays requests to backend services.
//!
//! Bodies are streamed in both directions. Each call is made exactly once;
//! a refused connection or a missed deadline is reported, never retried.

use crate::config::BackendConfig;
use crate::error::GatewayError;
use crate::routing::RouteRule;
use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Response},
};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use turnstile_common_http::{strip_hop_by_hop, HttpClient, HttpError};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("backend '{backend}' unavailable: {source}")]
    Unavailable {
        backend: String,
        #[source]
        source: HttpError,
    },

    #[error("backend '{backend}' timed out after {deadline:?}")]
    Timeout { backend: String, deadline: Duration },

    #[error("failed to build upstream response: {0}")]
    Response(#[from] axum::http::Error),
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Unavailable { backend, source } => GatewayError::UpstreamUnavailable {
                upstream: backend,
                detail: source.to_string(),
            },
            ForwardError::Timeout { backend, .. } => GatewayError::UpstreamTimeout { upstream: backend },
            other => GatewayError::Internal(other.into()),
        }
    }
}

/// A configured backend service.
#[derive(Debug, Clone)]
pub struct Backend {
    pub name: String,
    /// Base URL without a trailing `/`.
    pub base_url: String,
    pub timeout: Duration,
}

impl From<&BackendConfig> for Backend {
    fn from(config: &BackendConfig) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// The parts of an inbound request that are relayed.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// End-to-end headers only; hop-by-hop headers are stripped on receipt,
    /// before the gateway attaches anything.
    pub headers: HeaderMap,
    pub body: Body,
    /// Resolved client address, sent as `X-Real-IP`.
    pub client_ip: Option<String>,
    /// Address of the connected peer, appended to `X-Forwarded-For`.
    pub peer_ip: Option<String>,
}

pub struct BackendForwarder {
    client: HttpClient,
    backends: HashMap<String, Backend>,
}

impl BackendForwarder {
    pub fn new(client: HttpClient, backends: impl IntoIterator<Item = Backend>) -> Self {
        Self {
            client,
            backends: backends.into_iter().map(|b| (b.name.clone(), b)).collect(),
        }
    }

    pub fn backend(&self, name: &str) -> Option<&Backend> {
        self.backends.get(name)
    }

    /// Forward `request` to the backend named by `rule`.
    pub async fn forward(&self, rule: &RouteRule, request: ForwardRequest) -> Result<Response<Body>, ForwardError> {
        let backend = self
            .backends
            .get(&rule.backend)
            .ok_or_else(|| ForwardError::UnknownBackend(rule.backend.clone()))?;

        let url = upstream_url(backend, rule.strip_prefix.as_deref(), &request.path, request.query.as_deref());
        let deadline = rule.timeout.unwrap_or(backend.timeout);

        let mut headers = request.headers;
        headers.remove(header::HOST);
        add_forwarded_for(&mut headers, request.peer_ip.as_deref(), request.client_ip.as_deref());

        debug!(backend = %backend.name, url = %url, ?deadline, "Forwarding request");

        let mut upstream = self.client.inner().request(request.method, &url).headers(headers);
        // Bodyless requests stay bodyless upstream instead of turning chunked.
        if request.body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(request.body.into_data_stream()));
        }

        let response = self.client.send(upstream, deadline).await.map_err(|e| match e {
            HttpError::Timeout => ForwardError::Timeout {
                backend: backend.name.clone(),
                deadline,
            },
            source => ForwardError::Unavailable {
                backend: backend.name.clone(),
                source,
            },
        })?;

        relay(response)
    }
}

fn upstream_url(backend: &Backend, strip_prefix: Option<&str>, path: &str, query: Option<&str>) -> String {
    // Only strip whole segments.
    let stripped = strip_prefix.and_then(|prefix| {
        path.strip_prefix(prefix)
            .filter(|rest| prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'))
    });
    let path = match stripped {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(rest) => format!("/{}", rest),
        None => path.to_string(),
    };

    match query {
        Some(q) => format!("{}{}?{}", backend.base_url, path, q),
        None => format!("{}{}", backend.base_url, path),
    }
}

fn add_forwarded_for(headers: &mut HeaderMap, peer_ip: Option<&str>, client_ip: Option<&str>) {
    if let Some(peer) = peer_ip {
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, peer),
            _ => peer.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    match client_ip.map(HeaderValue::from_str) {
        Some(Ok(value)) => {
            headers.insert(X_REAL_IP, value);
        }
        _ => {
            headers.remove(X_REAL_IP);
        }
    }
}

fn relay(upstream: reqwest::Response) -> Result<Response<Body>, ForwardError> {
    let mut builder = Response::builder().status(upstream.status());

    if let Some(headers) = builder.headers_mut() {
        headers.extend(upstream.headers().clone());
        strip_hop_by_hop(headers);
    }

    Ok(builder.body(Body::from_stream(upstream.bytes_stream()))?)
}
