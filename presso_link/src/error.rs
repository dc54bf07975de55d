use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("not connected")]
    NotConnected,
    #[error("connection refused by {host}:{port}")]
    Refused { host: String, port: u16 },
    #[error("publish rejected: {0}")]
    PublishRejected(String),
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("no connection acknowledgment within {0} ms")]
    ConnectTimeout(u64),
    #[error("mqtt: {0}")]
    Mqtt(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
