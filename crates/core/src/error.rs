use thiserror::Error;

pub type FunnelResult<T> = Result<T, FunnelError>;

#[derive(Error, Debug)]
pub enum FunnelError {
    /// Bad caller input (window, granularity, limit). Rejected before any
    /// store accessor is called.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A store accessor failed. A partial funnel (events without
    /// transactions, or vice versa) is misleading, so this always fails the
    /// whole report; retry policy belongs to the accessor implementation.
    #[error("Upstream store unavailable: {0}")]
    Upstream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
