//! Server configuration

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::error::{Error, Result};

/// Route that publishes a fixed message to the connection named in its query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Route path, e.g. `/left`
    pub path: String,
    /// Message delivered when the route is hit
    pub message: String,
}

impl Trigger {
    /// Create a new trigger
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The stock trigger routes
pub fn default_triggers() -> Vec<Trigger> {
    vec![
        Trigger::new("/send", "you can put json in here as the data"),
        Trigger::new("/right", "right"),
        Trigger::new("/left", "left"),
    ]
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent streaming connections (0 = unlimited)
    pub max_connections: usize,

    /// Route that opens an event stream
    pub stream_path: String,

    /// Trigger routes
    pub triggers: Vec<Trigger>,

    /// Bytes buffered between a dispatcher and the response body
    pub stream_buffer_size: usize,

    /// How long a trigger waits for a busy connection (None = no limit)
    pub publish_timeout: Option<Duration>,

    /// Per-connection delivery loop settings
    pub dispatch: DispatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 0, // Unlimited
            stream_path: "/stream".to_string(),
            triggers: default_triggers(),
            stream_buffer_size: 64 * 1024, // 64KB
            publish_timeout: Some(Duration::from_secs(5)),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the stream route
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Add a trigger route
    pub fn trigger(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.triggers.push(Trigger::new(path, message));
        self
    }

    /// Replace all trigger routes
    pub fn triggers(mut self, triggers: Vec<Trigger>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Set publish timeout (None waits indefinitely)
    pub fn publish_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.write_timeout = timeout;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.idle_timeout = Some(timeout);
        self
    }

    /// Set stream buffer size
    pub fn stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    /// Check routes and sizes before building a router
    pub fn validate(&self) -> Result<()> {
        if !self.stream_path.starts_with('/') {
            return Err(Error::Config(format!(
                "stream path must start with '/': {}",
                self.stream_path
            )));
        }

        if self.stream_buffer_size == 0 {
            return Err(Error::Config("stream buffer size must be non-zero".into()));
        }

        let mut seen = HashSet::new();
        seen.insert(self.stream_path.as_str());

        for trigger in &self.triggers {
            if !trigger.path.starts_with('/') {
                return Err(Error::Config(format!(
                    "trigger path must start with '/': {}",
                    trigger.path
                )));
            }
            if !seen.insert(trigger.path.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate route: {}",
                    trigger.path
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.stream_path, "/stream");
        assert_eq!(config.triggers.len(), 3);
        assert_eq!(config.publish_timeout, Some(Duration::from_secs(5)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_triggers() {
        let triggers = default_triggers();

        assert_eq!(triggers[0], Trigger::new("/send", "you can put json in here as the data"));
        assert_eq!(triggers[1], Trigger::new("/right", "right"));
        assert_eq!(triggers[2], Trigger::new("/left", "left"));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(10)
            .stream_path("/events")
            .trigger("/up", "up")
            .publish_timeout(None)
            .write_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(60))
            .stream_buffer_size(1024);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.stream_path, "/events");
        assert_eq!(config.triggers.len(), 4);
        assert!(config.publish_timeout.is_none());
        assert_eq!(config.dispatch.write_timeout, Duration::from_secs(3));
        assert_eq!(config.dispatch.idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.stream_buffer_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_relative_path() {
        let config = ServerConfig::default().trigger("up", "up");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_duplicate_route() {
        let config = ServerConfig::default().trigger("/left", "again");
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ServerConfig::default().trigger("/stream", "clash");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_zero_buffer() {
        let config = ServerConfig::default().stream_buffer_size(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
