//! Demonstration Event Source
//!
//! Synthetic threats, alerts and traffic for running without a capture
//! layer. Feeds the controllers only through their public operations.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::logic::alerting::AlertController;
use crate::logic::error::Result;
use crate::logic::monitoring::TrafficMonitor;
use crate::logic::prevention::PreventionController;
use crate::logic::types::{AttackCategory, EventReport, Protocol, Severity};
use crate::logic::worker::{Periodic, Schedule, Worker};

const TICK: Duration = Duration::from_secs(1);
const BACKOFF: Duration = Duration::from_secs(5);

/// Threats and alerts are rolled every this many ticks
const EVENT_EVERY: u64 = 5;

const THREAT_CHANCE: f64 = 0.3;
const ALERT_CHANCE: f64 = 0.2;
const ATTACK_CHANCE: f64 = 0.3;

const ALERT_CATEGORIES: [AttackCategory; 7] = [
    AttackCategory::SqlInjection,
    AttackCategory::Xss,
    AttackCategory::Ddos,
    AttackCategory::PortScan,
    AttackCategory::BruteForce,
    AttackCategory::AnomalousTraffic,
    AttackCategory::SuspiciousDownload,
];

const EVENT_PROTOCOLS: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Http];

pub struct Simulator {
    prevention: Arc<PreventionController>,
    alerts: Arc<AlertController>,
    monitor: Arc<TrafficMonitor>,
    rng: Mutex<StdRng>,
    ticks: AtomicU64,
    worker: Worker,
}

impl Simulator {
    pub fn new(
        prevention: Arc<PreventionController>,
        alerts: Arc<AlertController>,
        monitor: Arc<TrafficMonitor>,
    ) -> Self {
        Self::with_rng(prevention, alerts, monitor, StdRng::from_entropy())
    }

    pub fn with_seed(
        prevention: Arc<PreventionController>,
        alerts: Arc<AlertController>,
        monitor: Arc<TrafficMonitor>,
        seed: u64,
    ) -> Self {
        Self::with_rng(prevention, alerts, monitor, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        prevention: Arc<PreventionController>,
        alerts: Arc<AlertController>,
        monitor: Arc<TrafficMonitor>,
        rng: StdRng,
    ) -> Self {
        Self {
            prevention,
            alerts,
            monitor,
            rng: Mutex::new(rng),
            ticks: AtomicU64::new(0),
            worker: Worker::new(Schedule::new(TICK, BACKOFF)),
        }
    }

    pub fn start(self: &Arc<Self>) -> bool {
        self.worker.start(Arc::clone(self))
    }

    pub async fn stop(&self) -> bool {
        self.worker.stop(self).await
    }

    /// One generation round
    pub fn step(&self) {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        let mut rng = self.rng.lock();

        if n % EVENT_EVERY == 0 {
            if rng.gen_bool(THREAT_CHANCE) {
                let category =
                    *AttackCategory::TRACKED.choose(&mut *rng).unwrap_or(&AttackCategory::PortScan);
                let report = random_report(&mut rng, category);
                self.prevention.submit_threat(report);
            }

            if rng.gen_bool(ALERT_CHANCE) {
                let category =
                    *ALERT_CATEGORIES.choose(&mut *rng).unwrap_or(&AttackCategory::PortScan);
                let report = random_report(&mut rng, category);
                self.alerts.submit_alert(report);
            }
        }

        self.monitor.record_traffic(rng.gen_range(100..=1500), rng.gen_range(50..=800));

        for _ in 0..3 {
            let protocol = *Protocol::ALL.choose(&mut *rng).unwrap_or(&Protocol::Other);
            self.monitor.record_protocol(protocol, rng.gen_range(1..=10));
        }

        if rng.gen_bool(ATTACK_CHANCE) {
            let category =
                *AttackCategory::TRACKED.choose(&mut *rng).unwrap_or(&AttackCategory::Ddos);
            self.monitor.record_attack(category, source_ip(&mut rng));
        }

        for _ in 0..5 {
            let ip = source_ip(&mut rng);
            self.monitor.record_source_traffic(ip, rng.gen_range(1..=100), rng.gen_range(1..=50));
        }
    }
}

fn source_ip(rng: &mut StdRng) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, rng.gen_range(2..=254)))
}

fn target_ip(rng: &mut StdRng) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, rng.gen_range(2..=254)))
}

fn random_report(rng: &mut StdRng, category: AttackCategory) -> EventReport {
    let severity = *Severity::ALL.choose(rng).unwrap_or(&Severity::Low);
    let protocol = *EVENT_PROTOCOLS.choose(rng).unwrap_or(&Protocol::Tcp);
    EventReport::new(category, severity, source_ip(rng), target_ip(rng))
        .with_port(rng.gen_range(1..=65535))
        .with_protocol(protocol)
}

impl Periodic for Simulator {
    fn name(&self) -> &'static str {
        "Event simulator"
    }

    fn tick(&self) -> Result<()> {
        self.step();
        Ok(())
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::alerting::AlertConfig;
    use crate::logic::prevention::{PreventionConfig, PreventionMode};
    use crate::logic::store::SnapshotStore;
    use tempfile::TempDir;

    fn build(seed: u64) -> (TempDir, Simulator) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let config = PreventionConfig { mode: PreventionMode::Monitor, ..Default::default() };
        let sim = Simulator::with_seed(
            Arc::new(PreventionController::new(config, store.clone())),
            Arc::new(AlertController::new(AlertConfig::default(), store.clone())),
            Arc::new(TrafficMonitor::new(store)),
            seed,
        );
        (dir, sim)
    }

    #[test]
    fn test_step_feeds_monitor() {
        let (_dir, sim) = build(7);
        for _ in 0..10 {
            sim.step();
        }

        let status = sim.monitor.status();
        assert_eq!(status.samples_ingested, 10);
        assert!(status.tracked_sources > 0);

        let stats = sim.monitor.network_stats();
        assert!(stats.traffic.history.iter().all(|s| (100..=1500).contains(&s.incoming)));
        assert!(stats.traffic.history.iter().all(|s| (50..=800).contains(&s.outgoing)));
        assert!(stats.protocols.values().any(|c| *c > 0));
    }

    #[test]
    fn test_generated_addresses_in_range() {
        let (_dir, sim) = build(42);
        for _ in 0..500 {
            sim.step();
        }
        for threat in sim.prevention.recent_threats(1000) {
            let IpAddr::V4(src) = threat.src_ip else { panic!("v6 source") };
            let IpAddr::V4(dst) = threat.dst_ip else { panic!("v6 target") };
            assert_eq!(src.octets()[..3], [192, 168, 1]);
            assert!((2..=254).contains(&src.octets()[3]));
            assert_eq!(dst.octets()[..3], [10, 0, 0]);
            assert!(!threat.blocked);
        }
        assert!(sim.prevention.status().threats_detected > 0);
        assert!(!sim.alerts.recent_alerts(1).is_empty());
    }
}
