use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use super::monitor::TrafficMonitor;
use super::timeframe::Timeframe;
use super::types::TrafficSample;
use crate::logic::clock::{Clock, ManualClock};
use crate::logic::events::names;
use crate::logic::events::testing::RecordingSink;
use crate::logic::store::{SnapshotKind, SnapshotStore};
use crate::logic::types::{AttackCategory, Protocol};
use crate::logic::worker::Periodic;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn setup() -> (TempDir, SnapshotStore, Arc<ManualClock>, Arc<RecordingSink>, TrafficMonitor) {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 2, 10, 30, 0).unwrap()));
    let sink = Arc::new(RecordingSink::default());
    let monitor = TrafficMonitor::new(store.clone())
        .with_sink(sink.clone())
        .with_clock(clock.clone());
    (dir, store, clock, sink, monitor)
}

#[test]
fn test_window_evicts_oldest() {
    let (_dir, _store, clock, _sink, monitor) = setup();
    for i in 0..301u64 {
        monitor.ingest_sample(TrafficSample::new(clock.now(), i, i));
        clock.advance_secs(1);
    }

    let status = monitor.status();
    assert_eq!(status.window_len, 300);
    assert_eq!(status.samples_ingested, 301);

    let hour = monitor.traffic_by_timeframe(Timeframe::Hour);
    assert_eq!(hour.len(), 300);
    assert_eq!(hour[0].incoming, 1);
}

#[test]
fn test_day_view_averages_per_hour() {
    let (_dir, _store, clock, _sink, monitor) = setup();
    let base = clock.now();
    monitor.ingest_sample(TrafficSample::new(base, 10, 10));
    monitor.ingest_sample(TrafficSample::new(base + Duration::minutes(5), 20, 11));
    clock.advance_secs(3600);

    let day = monitor.traffic_by_timeframe(Timeframe::Day);
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].timestamp, Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap());
    assert_eq!(day[0].incoming, 15);
    assert_eq!(day[0].outgoing, 10);

    // Older than an hour drops out of the raw hour view
    clock.advance_secs(600);
    assert!(monitor.traffic_by_timeframe(Timeframe::Hour).is_empty());
}

#[test]
fn test_recent_view_default() {
    let (_dir, _store, _clock, _sink, monitor) = setup();
    for i in 0..75 {
        monitor.record_traffic(i, 0);
    }
    let recent = monitor.traffic_by_timeframe(Timeframe::parse("anything"));
    assert_eq!(recent.len(), 60);
    assert_eq!(recent[0].incoming, 15);
}

#[test]
fn test_block_flag_only_for_seen_sources() {
    let (_dir, _store, _clock, _sink, monitor) = setup();
    assert!(!monitor.block_ip(ip("192.168.1.50")));

    monitor.record_source_traffic(ip("192.168.1.50"), 10, 5);
    assert!(monitor.block_ip(ip("192.168.1.50")));
    assert_eq!(monitor.status().flagged_sources, 1);
    assert!(monitor.unblock_ip(ip("192.168.1.50")));
    assert_eq!(monitor.status().flagged_sources, 0);
}

#[test]
fn test_emit_publishes_and_persists() {
    let (_dir, store, _clock, sink, monitor) = setup();
    monitor.record_traffic(200, 100);
    monitor.record_protocol(Protocol::Tcp, 3);
    monitor.record_attack(AttackCategory::PortScan, ip("192.168.1.9"));
    monitor.record_attack(AttackCategory::Xss, ip("192.168.1.9"));
    monitor.block_ip(ip("192.168.1.9"));

    let snapshot = monitor.emit_snapshot().unwrap();
    assert_eq!(snapshot.traffic_in, 200 * 1024);
    assert_eq!(snapshot.threats_detected, 2);
    assert_eq!(snapshot.ips_blocked, 1);

    assert_eq!(sink.count(names::NETWORK_STATS), 1);
    assert_eq!(sink.count(names::TRAFFIC_UPDATE), 1);
    let update = sink.last(names::TRAFFIC_UPDATE).unwrap();
    assert_eq!(update["history"].as_array().unwrap().len(), 1);
    assert_eq!(update["protocols"]["TCP"], 3);

    assert_eq!(store.list_snapshots(SnapshotKind::Monitoring).unwrap().len(), 1);
}

#[test]
fn test_tick_emits_at_most_once_per_second() {
    let (_dir, _store, clock, sink, monitor) = setup();
    monitor.tick().unwrap();
    monitor.tick().unwrap();
    assert_eq!(sink.count(names::NETWORK_STATS), 1);

    clock.advance_secs(1);
    monitor.tick().unwrap();
    assert_eq!(sink.count(names::NETWORK_STATS), 2);
}

#[test]
fn test_without_sink_only_periodic_dump_is_written() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 2, 10, 30, 0).unwrap()));
    let monitor = TrafficMonitor::new(store.clone()).with_clock(clock.clone());

    // Nothing ingested yet: no dump even once the minute has passed
    clock.advance_secs(60);
    monitor.tick().unwrap();
    assert!(store.list_snapshots(SnapshotKind::History).unwrap().is_empty());

    monitor.record_traffic(3, 4);
    monitor.tick().unwrap();
    clock.advance_secs(30);
    monitor.tick().unwrap();
    assert_eq!(store.list_snapshots(SnapshotKind::History).unwrap().len(), 1);

    clock.advance_secs(30);
    monitor.tick().unwrap();
    assert_eq!(store.list_snapshots(SnapshotKind::History).unwrap().len(), 2);
    assert!(store.list_snapshots(SnapshotKind::Monitoring).unwrap().is_empty());
}

#[test]
fn test_live_snapshots_and_dumps_do_not_collide() {
    let (_dir, store, clock, sink, monitor) = setup();
    monitor.record_traffic(1, 1);
    clock.advance_secs(60);
    monitor.tick().unwrap();

    assert_eq!(sink.count(names::NETWORK_STATS), 1);
    assert_eq!(store.list_snapshots(SnapshotKind::Monitoring).unwrap().len(), 1);
    assert_eq!(store.list_snapshots(SnapshotKind::History).unwrap().len(), 1);
}

#[test]
fn test_concurrent_ingestion_counts_every_sample() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 100;

    let (_dir, _store, clock, _sink, monitor) = setup();
    let monitor = &monitor;

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    monitor.record_traffic(t, i);
                    monitor.record_source_traffic(ip("192.168.1.9"), 1, 1);
                }
            });
        }
        scope.spawn(move || {
            for _ in 0..50 {
                monitor.tick().unwrap();
                clock.advance_secs(1);
            }
        });
    });

    let status = monitor.status();
    assert_eq!(status.samples_ingested, THREADS * PER_THREAD);
    assert_eq!(status.window_len, 300);
    let source = &monitor.source_data(1)[0];
    assert_eq!(source.traffic.in_traffic, THREADS * PER_THREAD);
}

#[test]
fn test_network_stats_and_sources() {
    let (_dir, _store, _clock, _sink, monitor) = setup();
    monitor.record_traffic(5, 1);
    monitor.record_traffic(7, 2);
    for i in 2..30u64 {
        monitor.record_source_traffic(ip(&format!("192.168.1.{}", i)), i, i);
    }

    let stats = monitor.network_stats();
    assert_eq!(stats.traffic.total_in, 12);
    assert_eq!(stats.traffic.total_out, 3);
    assert_eq!(stats.protocols.len(), 7);

    let sources = monitor.source_data(super::DEFAULT_SOURCE_LIMIT);
    assert_eq!(sources.len(), 20);
    assert_eq!(sources[0].ip, ip("192.168.1.29"));
}

#[tokio::test]
async fn test_stop_writes_dump() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let monitor = Arc::new(TrafficMonitor::new(store.clone()));
    assert!(monitor.start());
    monitor.record_traffic(1, 1);
    assert!(monitor.stop().await);

    assert!(store.list_snapshots(SnapshotKind::Monitoring).unwrap().is_empty());
    let files = store.list_snapshots(SnapshotKind::History).unwrap();
    assert_eq!(files.len(), 1);
    let dump: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(dump["traffic_history"].as_array().unwrap().len(), 1);
}
