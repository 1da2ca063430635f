//! Telemetry Types

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::types::{AttackCategory, Protocol};

pub type ProtocolStats = BTreeMap<Protocol, u64>;
pub type AttackStats = BTreeMap<AttackCategory, u64>;

/// One traffic reading (kilobytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub timestamp: DateTime<Utc>,
    pub incoming: u64,
    pub outgoing: u64,
}

impl TrafficSample {
    pub fn new(timestamp: DateTime<Utc>, incoming: u64, outgoing: u64) -> Self {
        Self { timestamp, incoming, outgoing }
    }
}

/// Per-address counters; created on first sight, never deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTraffic {
    pub in_traffic: u64,
    pub out_traffic: u64,
    pub threats: u64,
    pub last_seen: DateTime<Utc>,
    /// Informational only, no enforcement
    pub is_blocked: bool,
}

impl SourceTraffic {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            in_traffic: 0,
            out_traffic: 0,
            threats: 0,
            last_seen: now,
            is_blocked: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.in_traffic.saturating_add(self.out_traffic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    pub ip: IpAddr,
    #[serde(flatten)]
    pub traffic: SourceTraffic,
}

/// `network_stats` payload, also the persisted monitoring snapshot
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Bytes
    pub traffic_in: u64,
    /// Bytes
    pub traffic_out: u64,
    pub total_in: u64,
    pub total_out: u64,
    pub threats_detected: u64,
    pub ips_blocked: usize,
    pub protocol_stats: ProtocolStats,
    pub attack_stats: AttackStats,
    pub ip_data: Vec<SourceEntry>,
}

/// `traffic_update` payload
#[derive(Debug, Clone, Serialize)]
pub struct TrafficUpdate {
    pub history: Vec<TrafficSample>,
    pub protocols: ProtocolStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficSummary {
    pub history: Vec<TrafficSample>,
    pub total_in: u64,
    pub total_out: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub traffic: TrafficSummary,
    pub protocols: ProtocolStats,
    pub attacks: AttackStats,
}

/// Full dump written on stop
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringDump {
    pub traffic_history: Vec<TrafficSample>,
    pub protocol_stats: ProtocolStats,
    pub attack_stats: AttackStats,
    pub ip_data: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    pub is_running: bool,
    pub samples_ingested: u64,
    pub window_len: usize,
    pub tracked_sources: usize,
    pub flagged_sources: usize,
    pub threats_detected: u64,
}
