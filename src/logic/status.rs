//! System Status
//!
//! Read-only roll-up of the three controllers for the status line / API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::logic::alerting::AlertController;
use crate::logic::monitoring::TrafficMonitor;
use crate::logic::prevention::PreventionController;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: i64,
    pub detected_threats: u64,
    pub blocked_attacks: u64,
    pub active_blocks: usize,
    pub total_alerts: usize,
    pub samples_ingested: u64,
}

pub fn collect(
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    prevention: &PreventionController,
    alerts: &AlertController,
    monitor: &TrafficMonitor,
) -> SystemStatus {
    let p = prevention.status();
    let a = alerts.status();
    let m = monitor.status();

    SystemStatus {
        is_running: p.is_running && a.is_running && m.is_running,
        started_at,
        uptime_secs: started_at.map_or(0, |s| (now - s).num_seconds().max(0)),
        detected_threats: p.threats_detected,
        blocked_attacks: p.blocks_issued,
        active_blocks: p.active_blocks,
        total_alerts: a.total_alerts,
        samples_ingested: m.samples_ingested,
    }
}
