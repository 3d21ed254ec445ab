//! Platform utilities shared by the request-facing layers.

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateLimitDecision};
