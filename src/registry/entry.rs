//! Connection identity and per-connection registry state
//!
//! This module defines the types stored in the registry for each live
//! connection, and the envelope that carries a message from a publisher
//! into a connection's inbox.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

/// Opaque identifier issued to a connection when it registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered, dispatcher not yet serving
    Open,
    /// Dispatcher loop is running
    Serving,
    /// Shutdown requested; no new messages are accepted
    Closed,
}

impl ConnectionState {
    /// Whether publishers may still hand messages to this connection
    pub fn accepts_messages(self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

/// Registry-side record for one connection
#[derive(Debug)]
pub(super) struct ConnectionRecord {
    pub(super) state: ConnectionState,
    /// Dropped on close so the dispatcher sees the inbox end
    pub(super) inbox: Option<mpsc::Sender<Envelope>>,
    pub(super) registered_at: Instant,
}

impl ConnectionRecord {
    pub(super) fn new(inbox: mpsc::Sender<Envelope>) -> Self {
        Self {
            state: ConnectionState::Open,
            inbox: Some(inbox),
            registered_at: Instant::now(),
        }
    }

    /// Move to `Closed` and release the inbox sender
    ///
    /// Returns false if the record was already closed.
    pub(super) fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        self.inbox = None;
        true
    }
}

/// Point-in-time view of a registered connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection identifier
    pub id: ConnectionId,
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Time since registration
    pub connected_for: Duration,
}

/// A message in transit from a publisher to a dispatcher
///
/// Carries a oneshot acknowledgement so the publisher can wait until the
/// dispatcher has actually taken the message off the inbox.
#[derive(Debug)]
pub struct Envelope {
    message: String,
    ack: oneshot::Sender<()>,
}

impl Envelope {
    fn new(message: String) -> (Self, oneshot::Receiver<()>) {
        let (ack, ack_rx) = oneshot::channel();
        (Self { message, ack }, ack_rx)
    }

    /// Message payload
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Tell the publisher the message was received and take the payload
    ///
    /// Returns `None` if the publisher already gave up waiting (e.g. its
    /// publish timed out), in which case the message must not be written.
    pub fn acknowledge(self) -> Option<String> {
        match self.ack.send(()) {
            Ok(()) => Some(self.message),
            Err(()) => None,
        }
    }
}

/// The inbox went away before the message was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxClosed;

/// Why a bounded send did not hand its message over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTimeoutError {
    /// The inbox went away before the message was taken
    Closed,
    /// The dispatcher did not take the message in time; it will never be
    /// written
    TimedOut,
}

/// Sending half of a connection's inbox, obtained from
/// [`ConnectionRegistry::lookup`](super::ConnectionRegistry::lookup)
#[derive(Debug, Clone)]
pub struct InboxSender {
    id: ConnectionId,
    tx: mpsc::Sender<Envelope>,
}

impl InboxSender {
    pub(super) fn new(id: ConnectionId, tx: mpsc::Sender<Envelope>) -> Self {
        Self { id, tx }
    }

    /// Connection this inbox belongs to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hand a message to the dispatcher
    ///
    /// Completes only once the dispatcher has received the message, so at
    /// most one message per connection is ever waiting on the dispatcher.
    pub async fn send(&self, message: String) -> Result<(), InboxClosed> {
        let (envelope, ack_rx) = Envelope::new(message);
        self.tx.send(envelope).await.map_err(|_| InboxClosed)?;
        ack_rx.await.map_err(|_| InboxClosed)
    }

    /// Hand a message to the dispatcher, giving up after `after`
    ///
    /// A `TimedOut` result is final: the dispatcher either never sees the
    /// message or finds it abandoned and skips it.
    pub async fn send_timeout(
        &self,
        message: String,
        after: Duration,
    ) -> Result<(), SendTimeoutError> {
        let deadline = tokio::time::Instant::now() + after;
        let (envelope, mut ack_rx) = Envelope::new(message);

        match tokio::time::timeout_at(deadline, self.tx.send(envelope)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(SendTimeoutError::Closed),
            Err(_) => return Err(SendTimeoutError::TimedOut),
        }

        match tokio::time::timeout_at(deadline, &mut ack_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendTimeoutError::Closed),
            Err(_) => {
                // The dispatcher may acknowledge between the deadline and
                // here; after close() it can no longer do so
                ack_rx.close();
                match ack_rx.try_recv() {
                    Ok(()) => Ok(()),
                    Err(_) => Err(SendTimeoutError::TimedOut),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::from(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_u64(), 42);
    }

    #[test]
    fn test_state_accepts_messages() {
        assert!(ConnectionState::Open.accepts_messages());
        assert!(ConnectionState::Serving.accepts_messages());
        assert!(!ConnectionState::Closed.accepts_messages());
    }

    #[test]
    fn test_record_close_once() {
        let (tx, _rx) = mpsc::channel(1);
        let mut record = ConnectionRecord::new(tx);

        assert!(record.close());
        assert_eq!(record.state, ConnectionState::Closed);
        assert!(record.inbox.is_none());

        // Second close is a no-op
        assert!(!record.close());
    }

    #[test]
    fn test_acknowledge_after_publisher_gave_up() {
        let (envelope, ack_rx) = Envelope::new("late".into());
        assert_eq!(envelope.message(), "late");
        drop(ack_rx);

        assert!(envelope.acknowledge().is_none());
    }

    #[tokio::test]
    async fn test_send_waits_for_acknowledgement() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = InboxSender::new(ConnectionId::from(1), tx);

        let receiver = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            envelope.acknowledge()
        });

        sender.send("hello".into()).await.unwrap();
        assert_eq!(receiver.await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_abandons_message() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = InboxSender::new(ConnectionId::from(1), tx);

        // Take the envelope but hold it past the deadline
        let receiver = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            envelope.acknowledge()
        });

        let result = sender
            .send_timeout("slow".into(), Duration::from_millis(100))
            .await;
        assert_eq!(result, Err(SendTimeoutError::TimedOut));

        // The late acknowledgement fails, so the message is never written
        assert_eq!(receiver.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_delivers_in_time() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = InboxSender::new(ConnectionId::from(1), tx);

        let receiver = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            envelope.acknowledge()
        });

        let result = sender
            .send_timeout("quick".into(), Duration::from_millis(100))
            .await;
        assert_eq!(result, Ok(()));
        assert_eq!(receiver.await.unwrap().as_deref(), Some("quick"));
    }

    #[tokio::test]
    async fn test_send_to_dropped_inbox() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = InboxSender::new(ConnectionId::from(1), tx);

        assert_eq!(sender.send("lost".into()).await, Err(InboxClosed));
    }
}
