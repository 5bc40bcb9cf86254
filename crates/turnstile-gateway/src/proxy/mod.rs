//! Backend forwarding.

pub mod forwarder;

pub use forwarder::{Backend, BackendForwarder, ForwardError, ForwardRequest};
