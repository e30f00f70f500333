//! Connection registry for per-connection delivery
//!
//! The registry maps each live streaming connection to its inbox. It is the
//! only shared mutable state: every inbox has exactly one producer side (the
//! [`Publisher`](crate::publisher::Publisher)) and one consumer (the
//! connection's dispatcher task).
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ConnectionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ connections: HashMap<Id,     │
//!                 │   ConnectionRecord {         │
//!                 │     state,                   │
//!                 │     inbox: mpsc::Sender,     │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!           lookup(id)           │          register() -> Registration
//!         ┌──────────────────────┴──────────────────────┐
//!         ▼                                             ▼
//!    [Publisher]                                  [Dispatcher]
//!    inbox.send(msg) ──► one-slot channel ──► registration.recv() ──► TCP
//!         ▲                                             │
//!         └──────────────── ack (oneshot) ◄─────────────┘
//! ```
//!
//! # Lifecycle
//!
//! Each record moves `Open -> Serving -> Closed`. Only dropping the
//! [`Registration`] removes a record and closes its inbox, so a connection is
//! deregistered exactly once and a publisher can never observe an inbox that
//! was closed behind the registry's back: a send that races deregistration
//! fails with [`InboxClosed`] instead.

pub mod entry;
pub mod registration;
pub mod store;

pub use entry::{
    ConnectionId, ConnectionInfo, ConnectionState, Envelope, InboxClosed, InboxSender,
    SendTimeoutError,
};
pub use registration::Registration;
pub use store::ConnectionRegistry;
