//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! Preflight requests are answered here and never reach routing, rate
//! limiting or verification.

pub mod layer;
pub mod policy;

pub use layer::{CorsLayer, CorsMiddleware};
pub use policy::{AllowedOrigins, CorsPolicy};
