//! Connection registry implementation
//!
//! The central registry that maps connection IDs to their inboxes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::entry::{
    ConnectionId, ConnectionInfo, ConnectionRecord, ConnectionState, InboxSender,
};
use super::registration::Registration;

/// One slot: a publisher's envelope waits here until the dispatcher takes it
const INBOX_CAPACITY: usize = 1;

/// Registry of all live streaming connections
///
/// A single `RwLock` guards the map. Lookups take the read lock and may run
/// concurrently; register, deregister and close take the write lock. The
/// lock is never held across an await point.
pub struct ConnectionRegistry {
    /// Map of connection ID to its record
    connections: RwLock<HashMap<ConnectionId, ConnectionRecord>>,

    /// Next ID to issue
    next_id: AtomicU64,

    /// Set by `close_all`; written and read under the write lock
    closing: AtomicBool,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closing: AtomicBool::new(false),
        }
    }

    /// Register a new connection
    ///
    /// Issues a fresh ID, creates the connection's inbox, and returns the
    /// guard that keeps the connection registered for as long as it lives.
    /// After [`close_all`](Self::close_all) the record starts out `Closed`,
    /// so its inbox ends immediately and lookups never find it.
    ///
    /// # Panics
    ///
    /// Panics if the issued ID is already registered.
    pub fn register(self: &Arc<Self>) -> Registration {
        let id = ConnectionId::from(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        {
            let mut connections = self.connections.write();
            let mut record = ConnectionRecord::new(tx);
            let closing = self.closing.load(Ordering::Relaxed);
            if closing {
                record.close();
            }

            let previous = connections.insert(id, record);
            assert!(previous.is_none(), "connection {} registered twice", id);

            tracing::info!(
                connection_id = %id,
                connections = connections.len(),
                closing,
                "Connection registered"
            );
        }

        Registration::new(id, rx, Arc::clone(self))
    }

    /// Look up the inbox of a connection
    ///
    /// Returns `None` if the connection is unknown or already closed.
    pub fn lookup(&self, id: ConnectionId) -> Option<InboxSender> {
        let connections = self.connections.read();
        let record = connections.get(&id)?;

        if !record.state.accepts_messages() {
            return None;
        }

        record
            .inbox
            .as_ref()
            .map(|tx| InboxSender::new(id, tx.clone()))
    }

    pub(super) fn mark_serving(&self, id: ConnectionId) {
        let mut connections = self.connections.write();

        if let Some(record) = connections.get_mut(&id) {
            if record.state == ConnectionState::Open {
                record.state = ConnectionState::Serving;
                tracing::debug!(connection_id = %id, "Connection serving");
            }
        }
    }

    /// Remove a connection; called only from `Registration::drop`
    pub(super) fn deregister(&self, id: ConnectionId) {
        let mut connections = self.connections.write();

        match connections.remove(&id) {
            Some(mut record) => {
                record.close();
                tracing::info!(
                    connection_id = %id,
                    connections = connections.len(),
                    duration_ms = record.registered_at.elapsed().as_millis() as u64,
                    "Connection deregistered"
                );
            }
            None => {
                tracing::warn!(connection_id = %id, "Deregister of unknown connection");
            }
        }
    }

    /// Close a connection's inbox
    ///
    /// The dispatcher finishes any message already handed to it and then
    /// stops. The record stays registered until the dispatcher exits.
    /// Returns false if the connection is unknown or already closed.
    pub fn close(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write();

        let closed = connections
            .get_mut(&id)
            .map(|record| record.close())
            .unwrap_or(false);

        if closed {
            tracing::debug!(connection_id = %id, "Connection closed");
        }
        closed
    }

    /// Close every connection's inbox, returning how many were closed
    ///
    /// Also latches the registry into shutdown: connections registered
    /// afterwards are closed from the start.
    pub fn close_all(&self) -> usize {
        let mut connections = self.connections.write();
        self.closing.store(true, Ordering::Relaxed);

        let closed = connections
            .values_mut()
            .map(|record| record.close())
            .filter(|closed| *closed)
            .count();

        tracing::info!(closed = closed, "Closed all connections");
        closed
    }

    /// Check if `close_all` has been called
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }

    /// Check if a connection is registered (in any state)
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Get the lifecycle state of a connection
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.read().get(&id).map(|record| record.state)
    }

    /// Get a snapshot of a connection
    pub fn connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.read().get(&id).map(|record| ConnectionInfo {
            id,
            state: record.state,
            connected_for: record.registered_at.elapsed(),
        })
    }

    /// Get IDs of all registered connections, in ascending order
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get total number of registered connections
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Check if no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
