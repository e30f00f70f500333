//! Registration guard
//!
//! A [`Registration`] is the dispatcher's claim on a connection. It owns the
//! receiving half of the inbox, and dropping it is the only way a
//! connection leaves the registry.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::entry::{ConnectionId, Envelope};
use super::store::ConnectionRegistry;

/// Live registration of one connection
///
/// Deregisters the connection and closes its inbox when dropped, whatever
/// the reason the owner stopped (normal exit, error, panic or task abort).
pub struct Registration {
    id: ConnectionId,
    inbox: mpsc::Receiver<Envelope>,
    registry: Arc<ConnectionRegistry>,
}

impl Registration {
    pub(super) fn new(
        id: ConnectionId,
        inbox: mpsc::Receiver<Envelope>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            id,
            inbox,
            registry,
        }
    }

    /// Identifier issued to this connection
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Mark the connection as actively served
    pub fn start_serving(&self) {
        self.registry.mark_serving(self.id);
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the connection has been closed through the
    /// registry and no publisher still holds a sender.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
        self.inbox.close();
    }
}
