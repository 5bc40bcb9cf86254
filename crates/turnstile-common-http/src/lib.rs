//! Upstream HTTP client utilities for Turnstile.
//!
//! The gateway talks to two kinds of upstreams: the identity verifier and the
//! backend services. Both go through clients built here so that pooling,
//! redirect and timeout behaviour stay consistent.

pub mod client;
pub mod headers;

pub use client::{build_client, HttpClient, HttpConfig, HttpError};
pub use headers::{is_hop_by_hop, strip_hop_by_hop, HOP_BY_HOP_HEADERS};
