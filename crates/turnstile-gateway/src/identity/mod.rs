//! Identity verification and propagation.

pub mod propagator;
pub mod types;
pub mod verifier;

pub use propagator::{bearer_token, IdentityPropagator};
pub use types::{CorrelationId, VerifiedIdentity};
pub use verifier::{build_verifier, HttpVerifier, IdentityVerifier, JwtVerifier, VerifyError};
