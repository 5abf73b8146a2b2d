//! Error types for the event stream library

use thiserror::Error;

/// Result type for event log operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised by the event log backends
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis command failed (connection, protocol, server error)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload could not be serialized for publishing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Read or acknowledge against a group that was never created
    #[error("Consumer group '{group}' does not exist on stream '{stream}'")]
    NoGroup { stream: String, group: String },
}

impl StreamError {
    /// Transport-level failures are worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            StreamError::Redis(err) => {
                err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
            }
            _ => false,
        }
    }
}
