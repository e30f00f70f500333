//! Server-Sent Events push server
//!
//! Accepts long-lived SSE connections and delivers messages to one
//! connection at a time, addressed by the ID the connection was issued when
//! it registered.
//!
//! - [`registry`]: maps connection IDs to their inboxes
//! - [`dispatch`]: the per-connection loop that writes events
//! - [`publisher`]: hands a message to one connection
//! - [`server`]: HTTP stream and trigger routes
//!
//! # Example
//! ```no_run
//! use sse_push::{ServerConfig, SseServer};
//!
//! # async fn example() -> sse_push::error::Result<()> {
//! let server = SseServer::new(ServerConfig::default())?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod server;
pub mod stats;

pub use dispatch::{DispatchConfig, StreamDispatcher, Termination};
pub use error::{Error, PublishError, Result};
pub use publisher::{PublishOutcome, Publisher};
pub use registry::{ConnectionId, ConnectionRegistry, Registration};
pub use server::{ServerConfig, SseServer, Trigger};
