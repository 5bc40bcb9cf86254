//! Per-request gateway pipeline.

pub mod context;
pub mod pipeline;

pub use context::{DispatchState, RequestContext};
pub use pipeline::dispatch;
