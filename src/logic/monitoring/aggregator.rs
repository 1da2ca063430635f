//! Traffic Aggregator
//!
//! Lock-free core of the telemetry monitor: the rolling sample window, the
//! cumulative protocol / attack counters and the per-source table. The
//! monitor wraps it in its mutex.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};

use super::types::{
    AttackStats, MonitoringDump, NetworkSnapshot, NetworkStats, ProtocolStats, SourceEntry,
    SourceTraffic, TrafficSample, TrafficSummary, TrafficUpdate,
};
use crate::constants::{RECENT_SAMPLES, TOP_SOURCES_LIVE, TRAFFIC_WINDOW};
use crate::logic::buffer::BoundedLog;
use crate::logic::types::{AttackCategory, Protocol};

/// KB -> bytes for live payloads
const BYTES_PER_KB: u64 = 1024;

#[derive(Debug)]
pub struct TrafficAggregator {
    window: BoundedLog<TrafficSample>,
    protocols: ProtocolStats,
    attacks: AttackStats,
    sources: HashMap<IpAddr, SourceTraffic>,
    samples_ingested: u64,
}

impl Default for TrafficAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficAggregator {
    pub fn new() -> Self {
        Self {
            window: BoundedLog::new(TRAFFIC_WINDOW),
            protocols: Protocol::ALL.iter().map(|p| (*p, 0)).collect(),
            attacks: AttackCategory::TRACKED.iter().map(|c| (*c, 0)).collect(),
            sources: HashMap::new(),
            samples_ingested: 0,
        }
    }

    // ------------------------------------------------------------------------
    // UPDATES
    // ------------------------------------------------------------------------

    pub fn ingest(&mut self, sample: TrafficSample) {
        self.window.push(sample);
        self.samples_ingested += 1;
    }

    pub fn record_protocol(&mut self, protocol: Protocol, count: u64) {
        if let Some(counter) = self.protocols.get_mut(&protocol) {
            *counter = counter.saturating_add(count);
        }
    }

    /// Bump the category counter (tracked categories only) and the source's
    /// threat tally
    pub fn record_attack(&mut self, category: AttackCategory, source: IpAddr, now: DateTime<Utc>) {
        match self.attacks.get_mut(&category) {
            Some(counter) => *counter += 1,
            None => log::debug!("Category {} has no attack counter", category),
        }

        let entry = self.source_mut(source, now);
        entry.threats += 1;
        entry.last_seen = now;
    }

    pub fn record_source_traffic(
        &mut self,
        ip: IpAddr,
        incoming: u64,
        outgoing: u64,
        now: DateTime<Utc>,
    ) {
        let entry = self.source_mut(ip, now);
        entry.in_traffic = entry.in_traffic.saturating_add(incoming);
        entry.out_traffic = entry.out_traffic.saturating_add(outgoing);
        entry.last_seen = now;
    }

    fn source_mut(&mut self, ip: IpAddr, now: DateTime<Utc>) -> &mut SourceTraffic {
        self.sources.entry(ip).or_insert_with(|| SourceTraffic::new(now))
    }

    /// Set the informational flag; false for an address never observed
    pub fn set_blocked(&mut self, ip: IpAddr, blocked: bool) -> bool {
        match self.sources.get_mut(&ip) {
            Some(entry) => {
                entry.is_blocked = blocked;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // VIEWS
    // ------------------------------------------------------------------------

    pub fn window(&self) -> &BoundedLog<TrafficSample> {
        &self.window
    }

    pub fn recent(&self) -> Vec<TrafficSample> {
        self.window.tail(RECENT_SAMPLES)
    }

    /// Sources ordered by in + out traffic, largest first
    pub fn top_sources(&self, limit: usize) -> Vec<SourceEntry> {
        let mut entries: Vec<SourceEntry> = self
            .sources
            .iter()
            .map(|(ip, traffic)| SourceEntry { ip: *ip, traffic: traffic.clone() })
            .collect();
        entries.sort_by(|a, b| b.traffic.total().cmp(&a.traffic.total()).then(a.ip.cmp(&b.ip)));
        entries.truncate(limit);
        entries
    }

    pub fn source(&self, ip: IpAddr) -> Option<&SourceTraffic> {
        self.sources.get(&ip)
    }

    pub fn threats_detected(&self) -> u64 {
        self.attacks.values().sum()
    }

    pub fn flagged_sources(&self) -> usize {
        self.sources.values().filter(|s| s.is_blocked).count()
    }

    pub fn tracked_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn samples_ingested(&self) -> u64 {
        self.samples_ingested
    }

    pub fn protocols(&self) -> &ProtocolStats {
        &self.protocols
    }

    pub fn attacks(&self) -> &AttackStats {
        &self.attacks
    }

    fn totals(samples: &[TrafficSample]) -> (u64, u64) {
        samples.iter().fold((0u64, 0u64), |(i, o), s| {
            (i.saturating_add(s.incoming), o.saturating_add(s.outgoing))
        })
    }

    /// Live snapshot: latest sample (zeros if none) plus cumulative counters
    pub fn snapshot(&self, now: DateTime<Utc>) -> NetworkSnapshot {
        let current = self
            .window
            .last()
            .copied()
            .unwrap_or_else(|| TrafficSample::new(now, 0, 0));
        let (total_in, total_out) = Self::totals(&self.recent());

        NetworkSnapshot {
            timestamp: current.timestamp,
            traffic_in: current.incoming.saturating_mul(BYTES_PER_KB),
            traffic_out: current.outgoing.saturating_mul(BYTES_PER_KB),
            total_in,
            total_out,
            threats_detected: self.threats_detected(),
            ips_blocked: self.flagged_sources(),
            protocol_stats: self.protocols.clone(),
            attack_stats: self.attacks.clone(),
            ip_data: self.top_sources(TOP_SOURCES_LIVE),
        }
    }

    pub fn traffic_update(&self) -> TrafficUpdate {
        TrafficUpdate {
            history: self.recent(),
            protocols: self.protocols.clone(),
        }
    }

    pub fn network_stats(&self) -> NetworkStats {
        let history = self.recent();
        let (total_in, total_out) = Self::totals(&history);
        NetworkStats {
            traffic: TrafficSummary { history, total_in, total_out },
            protocols: self.protocols.clone(),
            attacks: self.attacks.clone(),
        }
    }

    pub fn dump(&self) -> MonitoringDump {
        MonitoringDump {
            traffic_history: self.window.tail(TRAFFIC_WINDOW),
            protocol_stats: self.protocols.clone(),
            attack_stats: self.attacks.clone(),
            ip_data: self.top_sources(usize::MAX),
        }
    }
}
