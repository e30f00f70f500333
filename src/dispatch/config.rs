//! Dispatcher configuration

use std::time::Duration;

/// Per-connection delivery loop settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum time a single write + flush may take before the connection
    /// is treated as broken
    pub write_timeout: Duration,

    /// Close the connection if no message arrives for this long (None = never)
    pub idle_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}

impl DispatchConfig {
    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}
