//! Central Configuration Constants
//!
//! Single source of truth for capacities, polling intervals and defaults.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "IDS Guard";

// ============================================
// Capacities
// ============================================

/// Threat ring buffer (mitigation controller)
pub const THREAT_LOG_CAPACITY: usize = 1000;

/// Alert ring buffer (notification controller)
pub const ALERT_LOG_CAPACITY: usize = 10_000;

/// Alerts written per hourly snapshot
pub const ALERT_SNAPSHOT_SIZE: usize = 1000;

/// Rolling traffic window
pub const TRAFFIC_WINDOW: usize = 300;

/// Samples summed / published per live update
pub const RECENT_SAMPLES: usize = 60;

/// Sources included in a live snapshot
pub const TOP_SOURCES_LIVE: usize = 5;

/// Sources included in alert statistics
pub const TOP_ALERT_SOURCES: usize = 10;

/// Pending notifications before new ones are dropped
pub const MAIL_QUEUE_CAPACITY: usize = 256;

/// Pending firewall changes before new ones are dropped
pub const ENFORCEMENT_QUEUE_CAPACITY: usize = 4096;

// ============================================
// Polling
// ============================================

pub const PREVENTION_INTERVAL: Duration = Duration::from_secs(5);
pub const PREVENTION_BACKOFF: Duration = Duration::from_secs(10);

pub const ALERTING_INTERVAL: Duration = Duration::from_secs(5);
pub const ALERTING_BACKOFF: Duration = Duration::from_secs(10);

pub const MONITORING_INTERVAL: Duration = Duration::from_secs(1);
pub const MONITORING_BACKOFF: Duration = Duration::from_secs(5);

/// Block sweep + threat snapshot cadence (seconds)
pub const BLOCK_SWEEP_SECS: i64 = 3600;

/// Alert snapshot cadence (seconds)
pub const ALERT_FLUSH_SECS: i64 = 3600;

/// Minimum spacing of live telemetry snapshots (seconds)
pub const SNAPSHOT_EMIT_SECS: i64 = 1;

/// Full monitoring dump cadence, with or without a live sink (seconds)
pub const MONITORING_DUMP_SECS: i64 = 60;

// ============================================
// Files
// ============================================

/// Active block list under `threats/`
pub const BLOCK_LIST_FILE: &str = "blocked_ips.json";

/// Default data directory: `<local data>/ids-guard/data`, else `./data`
pub static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .map(|d| d.join("ids-guard").join("data"))
        .unwrap_or_else(|| PathBuf::from("data"))
});
