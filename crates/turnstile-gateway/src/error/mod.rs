//! Gateway error taxonomy and the client-facing envelope.

pub mod response;
pub mod types;

pub use response::ErrorEnvelope;
pub use types::{GatewayError, GatewayResult};
