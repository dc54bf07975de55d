use thiserror::Error;

/// Profile validation failures (rejected at construction/edit time).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("point {index}: time {time} s is negative")]
    NegativeTime { index: usize, time: f64 },
    #[error("point {index}: time and pressure must be finite")]
    NonFinite { index: usize },
    #[error("point {index}: pressure {pressure} bar outside [{min}, {max}]")]
    PressureOutOfRange {
        index: usize,
        pressure: f64,
        min: f64,
        max: f64,
    },
    #[error("point {index}: duplicate time {time} s")]
    DuplicateTime { index: usize, time: f64 },
    #[error("point {index}: time {time} s is earlier than the previous point")]
    NotSorted { index: usize, time: f64 },
}

/// Terminal failures of a dispatch attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("credential rejected")]
    Unauthorized,
    #[error("profile compiles to an empty command sequence")]
    EmptyProfile,
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no acknowledgment within {waited_ms} ms")]
    AckTimeout { waited_ms: u64 },
    #[error("another dispatch is already in flight")]
    Busy,
    #[error("dispatch cancelled while awaiting acknowledgment")]
    Cancelled,
    #[error("encode command sequence: {0}")]
    Encode(String),
}

/// Profile persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid profile name {0:?}")]
    InvalidName(String),
    #[error("profile {0:?} not found")]
    NotFound(String),
    #[error("profile storage: {0}")]
    Backend(String),
    #[error("stored profile {name:?} is invalid: {source}")]
    Profile {
        name: String,
        #[source]
        source: ProfileError,
    },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
