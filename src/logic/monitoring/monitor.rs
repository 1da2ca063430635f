//! Traffic Telemetry Monitor
//!
//! Caller-directed counters plus a once-per-second live snapshot. The loop
//! publishes only while a live sink is attached; every published snapshot is
//! also written to `monitoring/`. Independently of the sink, the full history
//! is dumped every minute once samples have arrived.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::aggregator::TrafficAggregator;
use super::timeframe::{self, Timeframe};
use super::types::{MonitoringStatus, NetworkSnapshot, NetworkStats, SourceEntry, TrafficSample};
use crate::constants::{
    MONITORING_BACKOFF, MONITORING_DUMP_SECS, MONITORING_INTERVAL, SNAPSHOT_EMIT_SECS,
};
use crate::logic::clock::{self, Clock};
use crate::logic::error::Result;
use crate::logic::events::{self, names, LiveSink};
use crate::logic::store::{SnapshotKind, SnapshotStore};
use crate::logic::types::{AttackCategory, Protocol};
use crate::logic::worker::{Periodic, Schedule, Worker};

/// Default `source_data` size
pub const DEFAULT_SOURCE_LIMIT: usize = 20;

struct MonitorState {
    traffic: TrafficAggregator,
    last_emit: Option<DateTime<Utc>>,
    last_dump: DateTime<Utc>,
}

pub struct TrafficMonitor {
    state: Mutex<MonitorState>,
    store: SnapshotStore,
    sink: Option<Arc<dyn LiveSink>>,
    clock: Arc<dyn Clock>,
    worker: Worker,
}

impl TrafficMonitor {
    pub fn new(store: SnapshotStore) -> Self {
        let clock = clock::system();
        Self {
            state: Mutex::new(MonitorState {
                traffic: TrafficAggregator::new(),
                last_emit: None,
                last_dump: clock.now(),
            }),
            store,
            sink: None,
            clock,
            worker: Worker::new(Schedule::new(MONITORING_INTERVAL, MONITORING_BACKOFF)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LiveSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Also resets the dump schedule to the new clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.get_mut().last_dump = clock.now();
        self.clock = clock;
        self
    }

    pub fn start(self: &Arc<Self>) -> bool {
        self.worker.start(Arc::clone(self))
    }

    pub async fn stop(&self) -> bool {
        self.worker.stop(self).await
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    // ------------------------------------------------------------------------
    // INGESTION
    // ------------------------------------------------------------------------

    pub fn ingest_sample(&self, sample: TrafficSample) {
        self.state.lock().traffic.ingest(sample);
    }

    /// Stamp and ingest a reading taken now
    pub fn record_traffic(&self, incoming_kb: u64, outgoing_kb: u64) {
        let sample = TrafficSample::new(self.clock.now(), incoming_kb, outgoing_kb);
        self.ingest_sample(sample);
    }

    pub fn record_protocol(&self, protocol: Protocol, count: u64) {
        self.state.lock().traffic.record_protocol(protocol, count);
    }

    pub fn record_attack(&self, category: AttackCategory, source: IpAddr) {
        let now = self.clock.now();
        self.state.lock().traffic.record_attack(category, source, now);
    }

    pub fn record_source_traffic(&self, ip: IpAddr, incoming: u64, outgoing: u64) {
        let now = self.clock.now();
        self.state.lock().traffic.record_source_traffic(ip, incoming, outgoing, now);
    }

    // ------------------------------------------------------------------------
    // LIVE SNAPSHOT
    // ------------------------------------------------------------------------

    /// Publish `network_stats` and `traffic_update`, then persist the snapshot
    pub fn emit_snapshot(&self) -> Result<NetworkSnapshot> {
        let now = self.clock.now();
        let (snapshot, update) = {
            let mut state = self.state.lock();
            state.last_emit = Some(now);
            (state.traffic.snapshot(now), state.traffic.traffic_update())
        };

        let sink = self.sink.as_deref();
        events::emit(sink, names::NETWORK_STATS, &snapshot);
        events::emit(sink, names::TRAFFIC_UPDATE, &update);

        self.store.write_snapshot(SnapshotKind::Monitoring, &snapshot, now)?;
        Ok(snapshot)
    }

    fn emit_due(&self, now: DateTime<Utc>) -> bool {
        self.sink.is_some()
            && self
                .state
                .lock()
                .last_emit
                .map_or(true, |last| now - last >= Duration::seconds(SNAPSHOT_EMIT_SECS))
    }

    /// Whether the periodic dump is due; claims the slot when it is
    fn claim_dump(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        let due = state.traffic.samples_ingested() > 0
            && now - state.last_dump >= Duration::seconds(MONITORING_DUMP_SECS);
        if due {
            state.last_dump = now;
        }
        due
    }

    /// Write the full window, counters and source table to `monitoring/history_<ts>.json`
    pub fn save_monitoring_data(&self) -> Result<PathBuf> {
        let dump = self.state.lock().traffic.dump();
        self.store.write_snapshot(SnapshotKind::History, &dump, self.clock.now())
    }

    // ------------------------------------------------------------------------
    // FLAGS
    // ------------------------------------------------------------------------

    /// Flag an observed source as blocked (display only)
    pub fn block_ip(&self, ip: IpAddr) -> bool {
        let flagged = self.state.lock().traffic.set_blocked(ip, true);
        if flagged {
            log::info!("Flagged IP address as blocked: {}", ip);
        }
        flagged
    }

    pub fn unblock_ip(&self, ip: IpAddr) -> bool {
        let cleared = self.state.lock().traffic.set_blocked(ip, false);
        if cleared {
            log::info!("Cleared blocked flag for IP address: {}", ip);
        }
        cleared
    }

    // ------------------------------------------------------------------------
    // QUERIES
    // ------------------------------------------------------------------------

    pub fn traffic_by_timeframe(&self, timeframe: Timeframe) -> Vec<TrafficSample> {
        let now = self.clock.now();
        let state = self.state.lock();
        timeframe::select(state.traffic.window().iter(), timeframe, now)
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.state.lock().traffic.network_stats()
    }

    /// Top sources by in + out traffic
    pub fn source_data(&self, limit: usize) -> Vec<SourceEntry> {
        self.state.lock().traffic.top_sources(limit)
    }

    pub fn status(&self) -> MonitoringStatus {
        let state = self.state.lock();
        MonitoringStatus {
            is_running: self.worker.is_running(),
            samples_ingested: state.traffic.samples_ingested(),
            window_len: state.traffic.window().len(),
            tracked_sources: state.traffic.tracked_sources(),
            flagged_sources: state.traffic.flagged_sources(),
            threats_detected: state.traffic.threats_detected(),
        }
    }
}

impl Periodic for TrafficMonitor {
    fn name(&self) -> &'static str {
        "Network monitoring"
    }

    fn tick(&self) -> Result<()> {
        let now = self.clock.now();
        if self.emit_due(now) {
            self.emit_snapshot()?;
        }
        if self.claim_dump(now) {
            self.save_monitoring_data()?;
        }
        Ok(())
    }

    fn flush(&self) {
        if let Err(e) = self.save_monitoring_data() {
            log::error!("Failed to save monitoring data: {}", e);
        }
    }
}
