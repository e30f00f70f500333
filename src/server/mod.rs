//! SSE server implementation
//!
//! HTTP surface over the registry, dispatcher and publisher: one route opens
//! an event stream, trigger routes push fixed messages into a named stream.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::{default_triggers, ServerConfig, Trigger};
pub use listener::SseServer;
pub use routes::{TargetQuery, CONNECTION_ID_HEADER};
