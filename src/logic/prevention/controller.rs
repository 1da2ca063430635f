//! Intrusion Prevention Controller
//!
//! Scores sources by offense count, decides blocks under the active mode and
//! keeps the authoritative, time-bounded block list. Expiry is lazy: blocks
//! are reaped by the hourly sweep, never by per-block timers.
//!
//! Firewall changes are queued while the state lock is held, so they reach
//! the firewall in decision order, and are applied on the enforcement thread
//! after the lock is released.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::firewall::{Firewall, NullFirewall};
use super::types::{BlockRecord, PreventionConfig, PreventionMode, PreventionStatus};
use crate::constants::{
    BLOCK_LIST_FILE, BLOCK_SWEEP_SECS, ENFORCEMENT_QUEUE_CAPACITY, PREVENTION_BACKOFF,
    PREVENTION_INTERVAL, THREAT_LOG_CAPACITY,
};
use crate::logic::buffer::BoundedLog;
use crate::logic::clock::{self, Clock};
use crate::logic::dispatch::Dispatcher;
use crate::logic::error::Result;
use crate::logic::store::{SnapshotKind, SnapshotStore};
use crate::logic::types::{ActionTaken, EventReport, SecurityEvent, Severity, ThreatEvent};
use crate::logic::worker::{Periodic, Schedule, Worker};

// ============================================================================
// STATE
// ============================================================================

struct PreventionState {
    config: PreventionConfig,
    threats: BoundedLog<ThreatEvent>,
    offenses: HashMap<IpAddr, u64>,
    blocked: HashSet<IpAddr>,
    threats_detected: u64,
    blocks_issued: u64,
    last_sweep: DateTime<Utc>,
}

// ============================================================================
// ENFORCEMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enforcement {
    Block(IpAddr),
    Unblock(IpAddr),
}

fn enforce(firewall: &dyn Firewall, change: Enforcement) {
    let result = match change {
        Enforcement::Block(ip) => firewall.block(ip),
        Enforcement::Unblock(ip) => firewall.unblock(ip),
    };
    if let Err(e) = result {
        log::warn!("{} firewall: {} (block state kept)", firewall.name(), e);
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct PreventionController {
    state: Mutex<PreventionState>,
    store: SnapshotStore,
    blocks_path: PathBuf,
    enforcement: Dispatcher<Enforcement>,
    clock: Arc<dyn Clock>,
    worker: Worker,
}

impl PreventionController {
    pub fn new(config: PreventionConfig, store: SnapshotStore) -> Self {
        Self::with_parts(config, store, Arc::new(NullFirewall), clock::system())
    }

    /// Build with explicit collaborators; restores the blocked-set from the
    /// persisted block list.
    pub fn with_parts(
        config: PreventionConfig,
        store: SnapshotStore,
        firewall: Arc<dyn Firewall>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let blocks_path = store.document_path(SnapshotKind::Threats, BLOCK_LIST_FILE);

        let restored: HashSet<IpAddr> = store
            .read_list_or_empty::<BlockRecord>(&blocks_path)
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .map(|r| r.ip)
            .collect();

        if !restored.is_empty() {
            log::info!("Restored {} active blocks from {:?}", restored.len(), blocks_path);
        }

        let enforcement = Dispatcher::spawn(
            "firewall-enforcement",
            ENFORCEMENT_QUEUE_CAPACITY,
            move |change| enforce(firewall.as_ref(), change),
        );

        Self {
            state: Mutex::new(PreventionState {
                config,
                threats: BoundedLog::new(THREAT_LOG_CAPACITY),
                offenses: HashMap::new(),
                blocked: restored,
                threats_detected: 0,
                blocks_issued: 0,
                last_sweep: now,
            }),
            store,
            blocks_path,
            enforcement,
            clock,
            worker: Worker::new(Schedule::new(PREVENTION_INTERVAL, PREVENTION_BACKOFF)),
        }
    }

    // ------------------------------------------------------------------------
    // LIFECYCLE
    // ------------------------------------------------------------------------

    pub fn start(self: &Arc<Self>) -> bool {
        let started = self.worker.start(Arc::clone(self));
        if started {
            log::info!("Intrusion prevention mode: {}", self.state.lock().config.mode.as_str());
        }
        started
    }

    pub async fn stop(&self) -> bool {
        self.worker.stop(self).await
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    // ------------------------------------------------------------------------
    // THREAT INGESTION
    // ------------------------------------------------------------------------

    /// Record a threat, bump the source's offense count and apply the mode
    pub fn submit_threat(&self, report: EventReport) -> ThreatEvent {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let mut event = SecurityEvent::threat(report, now);
        state.threats_detected += 1;

        let offenses = {
            let count = state.offenses.entry(event.src_ip).or_insert(0);
            *count += 1;
            *count
        };

        let should_block = match state.config.mode {
            PreventionMode::Monitor => false,
            PreventionMode::Auto => offenses >= u64::from(state.config.block_threshold),
            PreventionMode::Strict => event.severity == Severity::High,
        };

        let action = if should_block
            && self.block_locked(&mut state, event.src_ip, Some(event.id.clone()), now)
        {
            ActionTaken::Blocked
        } else {
            ActionTaken::Monitored
        };
        event = event.with_action(action);

        log::info!(
            "Threat detected: {}, source: {}, severity: {}, action: {}",
            event.category,
            event.src_ip,
            event.severity,
            event.action_taken.as_str()
        );

        state.threats.push(event.clone());
        event
    }

    // ------------------------------------------------------------------------
    // BLOCKING
    // ------------------------------------------------------------------------

    /// Block an address. Returns false if it is already blocked.
    pub fn block_ip(&self, ip: IpAddr, threat_id: Option<String>) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.block_locked(&mut state, ip, threat_id, now)
    }

    /// Lift a block. Returns false if the address is not blocked.
    pub fn unblock_ip(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock();
        self.unblock_locked(&mut state, ip)
    }

    fn block_locked(
        &self,
        state: &mut PreventionState,
        ip: IpAddr,
        threat_id: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !state.blocked.insert(ip) {
            return false;
        }
        state.blocks_issued += 1;

        let record = BlockRecord::new(ip, threat_id, state.config.block_duration_mins, now);
        let mut records: Vec<BlockRecord> = self.store.read_list_or_empty(&self.blocks_path);
        records.retain(|r| r.ip != ip);
        records.push(record);
        if let Err(e) = self.store.write_list(&self.blocks_path, &records) {
            log::error!("Failed to save block record for {}: {}", ip, e);
        }

        self.enforcement.submit(Enforcement::Block(ip));

        log::warn!("Blocked IP address: {} for {} min", ip, state.config.block_duration_mins);
        true
    }

    fn unblock_locked(&self, state: &mut PreventionState, ip: IpAddr) -> bool {
        if !state.blocked.remove(&ip) {
            return false;
        }

        let mut records: Vec<BlockRecord> = self.store.read_list_or_empty(&self.blocks_path);
        let before = records.len();
        records.retain(|r| r.ip != ip);
        if records.len() != before {
            if let Err(e) = self.store.write_list(&self.blocks_path, &records) {
                log::error!("Failed to update block list after unblocking {}: {}", ip, e);
            }
        }

        self.enforcement.submit(Enforcement::Unblock(ip));

        log::info!("Unblocked IP address: {}", ip);
        true
    }

    /// Reap every persisted block whose expiry has passed; returns how many
    pub fn sweep_expired_blocks(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now)
    }

    fn sweep_locked(&self, state: &mut PreventionState, now: DateTime<Utc>) -> usize {
        state.last_sweep = now;

        let records: Vec<BlockRecord> = self.store.read_list_or_empty(&self.blocks_path);
        let (expired, active): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.is_expired(now));

        for record in &expired {
            if state.blocked.remove(&record.ip) {
                self.enforcement.submit(Enforcement::Unblock(record.ip));
                log::info!("Block expired for {}", record.ip);
            }
        }

        if let Err(e) = self.store.write_list(&self.blocks_path, &active) {
            log::error!("Failed to rewrite block list: {}", e);
        }

        log::info!("Cleaned up {} expired IP blocks", expired.len());
        expired.len()
    }

    // ------------------------------------------------------------------------
    // PERSISTENCE
    // ------------------------------------------------------------------------

    /// Write the threat buffer to `threats/threats_<ts>.json`
    pub fn save_threat_data(&self) -> Result<Option<PathBuf>> {
        let threats = self.state.lock().threats.tail(THREAT_LOG_CAPACITY);
        if threats.is_empty() {
            return Ok(None);
        }
        let path = self.store.write_snapshot(SnapshotKind::Threats, &threats, self.clock.now())?;
        log::info!("Saved {} threat records", threats.len());
        Ok(Some(path))
    }

    // ------------------------------------------------------------------------
    // CONFIGURATION
    // ------------------------------------------------------------------------

    pub fn set_mode(&self, mode: &str) -> bool {
        match PreventionMode::parse(mode) {
            Some(mode) => {
                self.state.lock().config.mode = mode;
                log::info!("Prevention mode set to: {}", mode.as_str());
                true
            }
            None => false,
        }
    }

    pub fn set_block_threshold(&self, threshold: i64) -> bool {
        match u32::try_from(threshold) {
            Ok(threshold) if threshold > 0 => {
                self.state.lock().config.block_threshold = threshold;
                log::info!("Block threshold set to: {}", threshold);
                true
            }
            _ => false,
        }
    }

    /// Minutes; 0 is allowed
    pub fn set_block_duration(&self, minutes: i64) -> bool {
        match u64::try_from(minutes) {
            Ok(minutes) => {
                self.state.lock().config.block_duration_mins = minutes;
                log::info!("Block duration set to: {} min", minutes);
                true
            }
            Err(_) => false,
        }
    }

    pub fn config(&self) -> PreventionConfig {
        self.state.lock().config.clone()
    }

    // ------------------------------------------------------------------------
    // QUERIES
    // ------------------------------------------------------------------------

    /// Last `limit` threats, most recent last
    pub fn recent_threats(&self, limit: usize) -> Vec<ThreatEvent> {
        self.state.lock().threats.tail(limit)
    }

    pub fn blocked_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.state.lock().blocked.iter().copied().collect();
        ips.sort();
        ips
    }

    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.state.lock().blocked.contains(&ip)
    }

    /// Offense count for an address (0 if never seen)
    pub fn threat_count(&self, ip: IpAddr) -> u64 {
        self.state.lock().offenses.get(&ip).copied().unwrap_or(0)
    }

    /// Persisted block list as currently on disk
    pub fn block_records(&self) -> Vec<BlockRecord> {
        let _state = self.state.lock();
        self.store.read_list_or_empty(&self.blocks_path)
    }

    pub fn status(&self) -> PreventionStatus {
        let state = self.state.lock();
        PreventionStatus {
            is_running: self.worker.is_running(),
            mode: state.config.mode,
            block_threshold: state.config.block_threshold,
            block_duration_mins: state.config.block_duration_mins,
            threats_detected: state.threats_detected,
            blocks_issued: state.blocks_issued,
            active_blocks: state.blocked.len(),
            tracked_sources: state.offenses.len(),
        }
    }
}

impl Periodic for PreventionController {
    fn name(&self) -> &'static str {
        "Intrusion prevention"
    }

    fn tick(&self) -> Result<()> {
        let now = self.clock.now();
        let due = {
            let mut state = self.state.lock();
            let due = now - state.last_sweep >= Duration::seconds(BLOCK_SWEEP_SECS);
            if due {
                self.sweep_locked(&mut state, now);
            }
            due
        };

        if due {
            self.save_threat_data()?;
        }
        Ok(())
    }

    fn flush(&self) {
        if let Err(e) = self.save_threat_data() {
            log::error!("Failed to save threat data: {}", e);
        }
    }
}
