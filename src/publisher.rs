//! Message publisher
//!
//! Entry point for external triggers: resolves a connection through the
//! registry and hands it one message.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PublishError;
use crate::registry::{ConnectionId, ConnectionRegistry, InboxClosed, SendTimeoutError};
use crate::stats::DeliveryStats;

/// Result of a publish that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The connection's dispatcher took the message
    Delivered,
    /// Nobody is registered under that ID; the message was dropped
    NoSubscriber,
    /// The connection went away while the message was being handed over;
    /// the message was dropped
    Closed,
}

/// Hands messages to individual connections
#[derive(Clone)]
pub struct Publisher {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<DeliveryStats>,
    timeout: Option<Duration>,
}

impl Publisher {
    /// Create a publisher that waits as long as the dispatcher needs
    pub fn new(registry: Arc<ConnectionRegistry>, stats: Arc<DeliveryStats>) -> Self {
        Self {
            registry,
            stats,
            timeout: None,
        }
    }

    /// Bound how long a publish waits for the dispatcher
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the registry this publisher delivers through
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Publish a message to one connection
    ///
    /// Waits until the connection's dispatcher has taken the message, so a
    /// slow connection holds up only its own publishers. Publishing to an
    /// unknown connection returns immediately. A timed-out message is never
    /// written to the stream.
    pub async fn publish(
        &self,
        id: ConnectionId,
        message: impl Into<String>,
    ) -> Result<PublishOutcome, PublishError> {
        let Some(inbox) = self.registry.lookup(id) else {
            self.stats.record_dropped();
            tracing::debug!(connection_id = %id, "No subscriber, message dropped");
            return Ok(PublishOutcome::NoSubscriber);
        };

        let message = message.into();
        let sent = match self.timeout {
            Some(after) => match inbox.send_timeout(message, after).await {
                Err(SendTimeoutError::TimedOut) => {
                    self.stats.record_publish_timeout();
                    tracing::warn!(
                        connection_id = %id,
                        timeout_ms = after.as_millis() as u64,
                        "Publish timed out"
                    );
                    return Err(PublishError::Timeout { id, after });
                }
                sent => sent.map_err(|_| InboxClosed),
            },
            None => inbox.send(message).await,
        };

        match sent {
            Ok(()) => Ok(PublishOutcome::Delivered),
            Err(InboxClosed) => {
                self.stats.record_dropped();
                tracing::debug!(connection_id = %id, "Connection closed during publish");
                Ok(PublishOutcome::Closed)
            }
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
