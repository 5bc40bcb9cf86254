//! Middleware applied in front of the dispatcher.

pub mod cors;

pub use cors::{CorsLayer, CorsMiddleware, CorsPolicy};
