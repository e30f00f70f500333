//! Error types
//!
//! Crate-wide error type and the errors a publish can return.

use std::time::Duration;

use crate::registry::ConnectionId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid server configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Publishing a message failed
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Error returned by [`Publisher::publish`](crate::publisher::Publisher::publish)
///
/// A missing subscriber is not an error; see
/// [`PublishOutcome`](crate::publisher::PublishOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The connection's dispatcher did not take the message in time
    #[error("Connection {id} did not accept the message within {after:?}")]
    Timeout { id: ConnectionId, after: Duration },
}
