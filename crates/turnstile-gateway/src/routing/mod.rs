//! Route classification.

pub mod classifier;
pub mod pattern;
pub mod rule;

pub use classifier::{NotFound, RouteTable};
pub use pattern::{PathPattern, PatternError};
pub use rule::{RouteClass, RouteRule};
