use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Price series is empty")]
    EmptySeries,

    #[error("Timestamp at bar {index} ({current}) is not after the previous bar ({previous})")]
    NonIncreasingTimestamp {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("Close price at bar {index} must be positive")]
    InvalidPrice { index: usize },

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("{strategy}: invalid parameter '{name}': {reason}")]
    InvalidParameter {
        strategy: String,
        name: String,
        reason: String,
    },

    #[error("Arithmetic overflow while trading at bar {index}")]
    Overflow { index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Optimization cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
