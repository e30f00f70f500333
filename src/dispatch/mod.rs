//! Streaming connection dispatch
//!
//! This module provides:
//! - SSE event framing
//! - The per-connection delivery loop
//! - Write and idle timeout settings

pub mod config;
pub mod dispatcher;
pub mod frame;

pub use config::DispatchConfig;
pub use dispatcher::{StreamDispatcher, Termination};
pub use frame::encode_event;
