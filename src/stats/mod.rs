//! Statistics for connections and message delivery

pub mod metrics;

pub use metrics::{DeliveryStats, StatsSnapshot};
