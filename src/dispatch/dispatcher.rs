//! Per-connection delivery loop
//!
//! One dispatcher task serves one streaming connection from registration to
//! teardown: it waits on the connection's inbox, frames each message, writes
//! and flushes it, and stops for good on the first failure.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::error::Elapsed;

use crate::registry::{Envelope, Registration};
use crate::stats::DeliveryStats;

use super::config::DispatchConfig;
use super::frame::encode_event;

/// Why a dispatcher loop stopped
#[derive(Debug)]
pub enum Termination {
    /// The connection was closed through the registry
    InboxClosed,
    /// Writing to the connection failed (client gone, transport reset)
    WriteFailed(std::io::Error),
    /// A write did not complete within the write timeout
    WriteTimedOut,
    /// No message arrived within the idle timeout
    IdleTimedOut,
}

impl Termination {
    /// Whether the connection ended because it could not be written to
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Termination::WriteFailed(_) | Termination::WriteTimedOut)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::InboxClosed => write!(f, "inbox closed"),
            Termination::WriteFailed(e) => write!(f, "write failed: {}", e),
            Termination::WriteTimedOut => write!(f, "write timed out"),
            Termination::IdleTimedOut => write!(f, "idle timeout"),
        }
    }
}

/// Drives streaming connections
///
/// Cheap to clone; the HTTP layer clones one into every connection task.
#[derive(Debug, Clone)]
pub struct StreamDispatcher {
    config: DispatchConfig,
    stats: Arc<DeliveryStats>,
}

impl StreamDispatcher {
    /// Create a dispatcher with the given configuration
    pub fn new(config: DispatchConfig, stats: Arc<DeliveryStats>) -> Self {
        Self { config, stats }
    }

    /// Get the dispatcher configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Serve one connection until it terminates
    ///
    /// Takes ownership of the registration; it is dropped (and the
    /// connection deregistered) on every exit path before this returns.
    pub async fn run<W>(&self, mut registration: Registration, mut writer: W) -> Termination
    where
        W: AsyncWrite + Unpin,
    {
        let id = registration.id();
        registration.start_serving();
        self.stats.record_connection_opened();

        tracing::debug!(connection_id = %id, "Dispatcher started");

        let termination = loop {
            let envelope = match self.next_envelope(&mut registration).await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break Termination::InboxClosed,
                Err(_) => break Termination::IdleTimedOut,
            };

            // Publisher stopped waiting; it has already reported a timeout
            let Some(message) = envelope.acknowledge() else {
                tracing::debug!(connection_id = %id, "Skipping abandoned message");
                continue;
            };

            let frame = encode_event(&message);
            if let Err(termination) = self.write_frame(&mut writer, &frame).await {
                self.stats.record_write_failure();
                break termination;
            }

            self.stats.record_delivered();
            tracing::trace!(connection_id = %id, bytes = frame.len(), "Event written");
        };

        drop(registration);
        self.stats.record_connection_closed();

        if termination.is_write_failure() {
            tracing::debug!(connection_id = %id, reason = %termination, "Dispatcher stopped");
        } else {
            tracing::info!(connection_id = %id, reason = %termination, "Dispatcher stopped");
        }

        termination
    }

    async fn next_envelope(
        &self,
        registration: &mut Registration,
    ) -> Result<Option<Envelope>, Elapsed> {
        match self.config.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, registration.recv()).await,
            None => Ok(registration.recv().await),
        }
    }

    async fn write_frame<W>(&self, writer: &mut W, frame: &[u8]) -> Result<(), Termination>
    where
        W: AsyncWrite + Unpin,
    {
        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };

        match tokio::time::timeout(self.config.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Termination::WriteFailed(e)),
            Err(_) => Err(Termination::WriteTimedOut),
        }
    }
}
