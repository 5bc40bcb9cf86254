//! Verification through an external sidecar.
//!
//! The sidecar answers `GET <endpoint>` with `200` and the identity in
//! `X-Auth-User-ID` / `X-Auth-User-Role`, or with `401` and a JSON body
//! `{"error": .., "message": ..}`.

use super::{IdentityVerifier, VerifyError};
use crate::identity::types::VerifiedIdentity;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use turnstile_common_http::{HttpClient, HttpError};

const USER_ID_HEADER: &str = "x-auth-user-id";
const ROLE_HEADER: &str = "x-auth-user-role";

#[derive(Debug, Deserialize)]
struct Rejection {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Body fallback for verifiers that report identity as JSON.
#[derive(Debug, Deserialize)]
struct IdentityBody {
    subject_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

pub struct HttpVerifier {
    client: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl HttpVerifier {
    pub fn new(client: HttpClient, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let request = self
            .client
            .inner()
            .get(&self.endpoint)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));

        let response = self.client.send(request, self.timeout).await.map_err(|e| match e {
            HttpError::Timeout => VerifyError::Timeout,
            other => VerifyError::Unavailable(other.to_string()),
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), "Verifier responded");

        if status.is_success() {
            return identity_from(response).await;
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let reason = response
                .json::<Rejection>()
                .await
                .ok()
                .and_then(|r| r.message.or(r.error))
                .unwrap_or_else(|| "rejected by verifier".to_string());
            return Err(VerifyError::Rejected(reason));
        }

        Err(VerifyError::Unavailable(format!("verifier returned {}", status)))
    }
}

async fn identity_from(response: reqwest::Response) -> Result<VerifiedIdentity, VerifyError> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if let Some(subject_id) = header(USER_ID_HEADER).filter(|s| !s.is_empty()) {
        let role = header(ROLE_HEADER).unwrap_or_default();
        return Ok(VerifiedIdentity::new(subject_id, role));
    }

    let body: IdentityBody = response
        .json()
        .await
        .map_err(|e| VerifyError::Unavailable(format!("unreadable verifier response: {}", e)))?;

    match body.subject_id.filter(|s| !s.is_empty()) {
        Some(subject_id) => Ok(VerifiedIdentity::new(subject_id, body.role.unwrap_or_default())),
        None => Err(VerifyError::Unavailable(
            "verifier response carried no subject".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn verifier_for(server: &MockServer, timeout: Duration) -> HttpVerifier {
        HttpVerifier::new(
            HttpClient::new().unwrap(),
            format!("{}/verify", server.uri()),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_accepts_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify"))
            .and(header_eq("authorization", "Bearer good-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Auth-User-ID", "17")
                    .insert_header("X-Auth-User-Role", "instructor")
                    .set_body_json(serde_json::json!({"status": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let identity = verifier_for(&server, Duration::from_secs(1))
            .await
            .verify("good-token")
            .await
            .unwrap();

        assert_eq!(identity.subject_id, "17");
        assert_eq!(identity.role, "instructor");
    }

    #[tokio::test]
    async fn test_accepts_identity_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"subject_id": "9", "role": "student"})),
            )
            .mount(&server)
            .await;

        let identity = verifier_for(&server, Duration::from_secs(1))
            .await
            .verify("token")
            .await
            .unwrap();

        assert_eq!(identity, VerifiedIdentity::new("9", "student"));
    }

    #[tokio::test]
    async fn test_rejection_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Unauthorized",
                "message": "Invalid or expired token",
            })))
            .mount(&server)
            .await;

        let err = verifier_for(&server, Duration::from_secs(1))
            .await
            .verify("expired")
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::Rejected(reason) if reason == "Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = verifier_for(&server, Duration::from_secs(1))
            .await
            .verify("token")
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_verifier_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = verifier_for(&server, Duration::from_millis(50))
            .await
            .verify("token")
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::Timeout));
    }
}
