use thiserror::Error;

/// Errors surfaced by scene queries and configuration loading.
///
/// Behaviors never propagate these to the frame loop; they log a warning
/// and stay inert instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("entity not found")]
    UnknownEntity,

    #[error("re-parenting would create a cycle")]
    ParentCycle,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
