use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("publish failed: {0}")]
    Publish(String),
}

pub type EventResult<T> = Result<T, EventError>;
