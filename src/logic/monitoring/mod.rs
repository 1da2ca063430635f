//! Network Monitoring
//!
//! Traffic telemetry for the live dashboard.
//!
//! # Components
//! - `types.rs`: samples, per-source counters, payload shapes
//! - `aggregator.rs`: window + counters (no locking)
//! - `timeframe.rs`: hour / day / week views
//! - `monitor.rs`: `TrafficMonitor` (locking, live publish, persistence)

pub mod aggregator;
pub mod monitor;
pub mod timeframe;
pub mod types;
#[cfg(test)]
mod tests;

pub use monitor::{TrafficMonitor, DEFAULT_SOURCE_LIMIT};
pub use timeframe::Timeframe;
pub use types::{
    MonitoringStatus, NetworkSnapshot, NetworkStats, SourceEntry, SourceTraffic, TrafficSample,
};
