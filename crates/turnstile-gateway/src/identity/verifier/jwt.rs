//! In-process HS256 verification.

use super::{IdentityVerifier, VerifyError};
use crate::identity::types::VerifiedIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the user service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Rejected("Token has expired".into()),
                _ => VerifyError::Rejected("Invalid or expired token".into()),
            })?
            .claims;

        let subject_id = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VerifyError::Rejected("Token missing required 'sub' claim".into()))?;

        // Refresh tokens must not open protected routes.
        if claims.token_type.as_deref() != Some("access") {
            return Err(VerifyError::Rejected("Invalid token type".into()));
        }

        Ok(VerifiedIdentity {
            subject_id,
            role: claims.role.unwrap_or_default(),
            issued_at: claims.iat.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            expires_at: DateTime::<Utc>::from_timestamp(claims.exp, 0),
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        self.decode(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test_secret_key_that_is_32_chars!";

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[tokio::test]
    async fn test_valid_access_token() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(
            serde_json::json!({"sub": "42", "type": "access", "role": "student", "iat": now(), "exp": now() + 600}),
            SECRET,
        );

        let identity = verifier.verify(&jwt).await.unwrap();
        assert_eq!(identity.subject_id, "42");
        assert_eq!(identity.role, "student");
        assert!(identity.expires_at.is_some());
    }

    #[test]
    fn test_missing_role_is_empty() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(serde_json::json!({"sub": "42", "type": "access", "exp": now() + 600}), SECRET);

        assert_eq!(verifier.decode(&jwt).unwrap().role, "");
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(serde_json::json!({"sub": "42", "type": "access", "exp": now() - 60}), SECRET);

        assert!(matches!(verifier.decode(&jwt), Err(VerifyError::Rejected(r)) if r == "Token has expired"));
    }

    #[test]
    fn test_refresh_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(serde_json::json!({"sub": "42", "type": "refresh", "exp": now() + 600}), SECRET);

        assert!(matches!(verifier.decode(&jwt), Err(VerifyError::Rejected(_))));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(serde_json::json!({"type": "access", "exp": now() + 600}), SECRET);

        assert!(matches!(verifier.decode(&jwt), Err(VerifyError::Rejected(r)) if r.contains("sub")));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(
            serde_json::json!({"sub": "42", "type": "access", "exp": now() + 600}),
            "another_secret_key_of_32_characters",
        );

        assert!(verifier.decode(&jwt).is_err());
        assert!(verifier.decode("not-a-jwt").is_err());
    }
}
