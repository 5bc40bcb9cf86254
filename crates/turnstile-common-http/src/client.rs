//! HTTP client configuration.

use reqwest::{redirect, Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle pooled connections are closed after this long.
    pub pool_idle_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Follow upstream redirects instead of relaying them.
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("turnstile/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 32,
            follow_redirects: false,
        }
    }
}

/// Build a configured HTTP client.
///
/// No overall request timeout is set on the client; callers bound each call
/// with the deadline that applies to it (verifier or per-route backend).
pub fn build_client(config: HttpConfig) -> Result<Client, HttpError> {
    let redirects = if config.follow_redirects {
        redirect::Policy::limited(5)
    } else {
        redirect::Policy::none()
    };

    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .redirect(redirects)
        .build()
        .map_err(HttpError::ClientBuild)
}

/// HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,
}

impl HttpError {
    /// Whether the upstream exceeded its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if e.is_connect() {
            HttpError::Connect(e)
        } else {
            HttpError::Request(e)
        }
    }
}

/// Shared HTTP client for upstream calls.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default config.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new HTTP client with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        let inner = build_client(config)?;
        Ok(Self { inner })
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Send a prepared request, bounded by `deadline`.
    ///
    /// The deadline covers the time to response headers only; reqwest's own
    /// timeout would also cut off bodies that are still being relayed.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
        deadline: Duration,
    ) -> Result<reqwest::Response, HttpError> {
        match tokio::time::timeout(deadline, request.send()).await {
            Ok(result) => result.map_err(HttpError::from),
            Err(_) => Err(HttpError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.user_agent.starts_with("turnstile/"));
        assert_eq!(config.pool_max_idle_per_host, 32);
        assert!(!config.follow_redirects);
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new().unwrap();
        let request = client.inner().get(format!("http://{}/", addr));
        let err = client
            .send(request, Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Connect(_)));
        assert!(!err.is_timeout());
    }
}
