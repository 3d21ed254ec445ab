//! Funnelworks core — shared domain types, configuration, and the error
//! taxonomy for the session-attributed conversion-funnel pipeline.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{FunnelError, FunnelResult};
