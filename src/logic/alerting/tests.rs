use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use super::controller::AlertController;
use super::notify::testing::RecordingMailer;
use super::types::AlertConfig;
use crate::logic::clock::ManualClock;
use crate::logic::dispatch::testing::wait_until;
use crate::logic::events::names;
use crate::logic::events::testing::RecordingSink;
use crate::logic::store::{SnapshotKind, SnapshotStore};
use crate::logic::types::{AttackCategory, EventReport, Severity};
use crate::logic::worker::Periodic;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn report(src: &str, category: AttackCategory, severity: Severity) -> EventReport {
    EventReport::new(category, severity, ip(src), ip("10.0.0.2"))
}

struct Harness {
    _dir: TempDir,
    store: SnapshotStore,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    mailer: Arc<RecordingMailer>,
    alerts: AlertController,
}

fn harness(config: AlertConfig, mailer: RecordingMailer) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()));
    let sink = Arc::new(RecordingSink::default());
    let mailer = Arc::new(mailer);

    let alerts = AlertController::new(config, store.clone())
        .with_sink(sink.clone())
        .with_mailer(mailer.clone())
        .with_clock(clock.clone());

    Harness { _dir: dir, store, clock, sink, mailer, alerts }
}

fn default_harness() -> Harness {
    harness(AlertConfig::default(), RecordingMailer::default())
}

#[test]
fn test_throttle_window_scenario() {
    let h = default_harness();
    let scan = || report("192.168.1.10", AttackCategory::PortScan, Severity::High);

    assert!(h.alerts.submit_alert(scan()));
    assert_eq!(h.sink.count(names::NEW_ALERT), 1);

    h.clock.advance_secs(100);
    assert!(h.alerts.submit_alert(scan()));
    assert_eq!(h.sink.count(names::NEW_ALERT), 1);

    h.clock.advance_secs(201);
    assert!(h.alerts.submit_alert(scan()));
    assert_eq!(h.sink.count(names::NEW_ALERT), 2);

    // All three are recorded regardless of forwarding
    assert_eq!(h.alerts.recent_alerts(10).len(), 3);
    assert_eq!(h.alerts.status().suppressed, 1);
}

#[test]
fn test_severity_floor() {
    let h = default_harness();
    h.alerts.submit_alert(report("192.168.1.11", AttackCategory::Xss, Severity::Low));
    assert_eq!(h.sink.count(names::NEW_ALERT), 0);
    assert_eq!(h.alerts.recent_alerts(10).len(), 1);

    h.alerts.submit_alert(report("192.168.1.11", AttackCategory::Xss, Severity::Medium));
    assert_eq!(h.sink.count(names::NEW_ALERT), 1);
    let payload = h.sink.last(names::NEW_ALERT).unwrap();
    assert_eq!(payload["severity"], "medium");
    assert_eq!(payload["action_taken"], "logged");
}

#[test]
fn test_throttling_disabled_forwards_everything() {
    let config = AlertConfig { alert_throttling: false, ..Default::default() };
    let h = harness(config, RecordingMailer::default());
    for _ in 0..4 {
        h.alerts.submit_alert(report("192.168.1.12", AttackCategory::Ddos, Severity::High));
    }
    assert_eq!(h.sink.count(names::NEW_ALERT), 4);
}

#[test]
fn test_email_requires_recipients() {
    let config = AlertConfig { email_notification: true, ..Default::default() };
    let h = harness(config, RecordingMailer::default());

    h.alerts.submit_alert(report("192.168.1.13", AttackCategory::Malware, Severity::High));
    assert!(h.mailer.sent.lock().is_empty());

    assert!(h.alerts.update_config(&json!({"email_recipients": "sec@example.com"})));
    h.alerts.submit_alert(report("192.168.1.14", AttackCategory::Malware, Severity::High));

    assert!(wait_until(Duration::from_secs(2), || h.alerts.status().emails_delivered == 1));
    let sent = h.mailer.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["sec@example.com"]);
}

fn email_config() -> AlertConfig {
    AlertConfig {
        email_notification: true,
        email_recipients: vec!["sec@example.com".to_string()],
        ..Default::default()
    }
}

#[test]
fn test_mail_failure_is_logged_and_counted() {
    let h = harness(email_config(), RecordingMailer { fail: true, ..Default::default() });

    let brute = report("192.168.1.15", AttackCategory::BruteForce, Severity::High);
    assert!(h.alerts.submit_alert(brute));
    // Web delivery still happened and the alert was recorded
    assert_eq!(h.sink.count(names::NEW_ALERT), 1);
    assert_eq!(h.alerts.recent_alerts(1).len(), 1);

    assert!(wait_until(Duration::from_secs(2), || h.alerts.status().email_failures == 1));
    assert_eq!(h.alerts.status().emails_delivered, 0);
}

#[test]
fn test_slow_mailer_does_not_delay_submission() {
    let mailer = RecordingMailer { delay: Some(Duration::from_secs(2)), ..Default::default() };
    let h = harness(email_config(), mailer);

    let started = Instant::now();
    for i in 0..3u8 {
        let src = format!("192.168.1.{}", 60 + i);
        assert!(h.alerts.submit_alert(report(&src, AttackCategory::Ddos, Severity::High)));
    }
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(h.sink.count(names::NEW_ALERT), 3);

    assert!(wait_until(Duration::from_secs(10), || h.mailer.sent.lock().len() == 3));
    assert_eq!(h.alerts.status().emails_delivered, 3);
}

#[test]
fn test_concurrent_submissions_forward_once_per_window() {
    const THREADS: usize = 16;

    let h = default_harness();
    let alerts = &h.alerts;

    let results: Vec<bool> = thread::scope(|scope| {
        let submitters: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    let scan = report("192.168.1.70", AttackCategory::PortScan, Severity::High);
                    alerts.submit_alert(scan)
                })
            })
            .collect();
        let maintenance = scope.spawn(move || {
            for _ in 0..50 {
                alerts.tick().unwrap();
            }
        });

        maintenance.join().unwrap();
        submitters.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(results.iter().all(|ok| *ok));
    assert_eq!(h.sink.count(names::NEW_ALERT), 1);
    assert_eq!(h.alerts.recent_alerts(100).len(), THREADS);

    let status = h.alerts.status();
    assert_eq!(status.notifications_sent, 1);
    assert_eq!(status.suppressed, THREADS as u64 - 1);
}

#[test]
fn test_alert_log_keeps_last_ten_thousand() {
    let h = default_harness();
    let scan = || report("192.168.1.80", AttackCategory::PortScan, Severity::High);

    assert!(h.alerts.submit_alert(scan()));
    let first = h.alerts.recent_alerts(1).remove(0);
    for _ in 0..10_000 {
        h.alerts.submit_alert(scan());
    }

    let recent = h.alerts.recent_alerts(20_000);
    assert_eq!(recent.len(), 10_000);
    assert!(recent.iter().all(|a| a.id != first.id));
    assert_eq!(h.alerts.alert_stats().total, 10_000);
    assert_eq!(h.alerts.status().suppressed, 10_000);
}

#[test]
fn test_web_notification_off() {
    let h = default_harness();
    assert!(h.alerts.update_config(&json!({"web_notification": false})));
    h.alerts.submit_alert(report("192.168.1.16", AttackCategory::Xss, Severity::High));
    assert_eq!(h.sink.count(names::NEW_ALERT), 0);
}

#[test]
fn test_update_config_partial_merge() {
    let h = default_harness();
    assert!(!h.alerts.update_config(&json!({})));
    assert!(!h.alerts.update_config(&json!(null)));

    assert!(h.alerts.update_config(&json!({
        "min_severity": "high",
        "throttle_period": "abc",
        "email_recipients": ["a@x.io", "b@x.io"],
    })));

    let config = h.alerts.config();
    assert_eq!(config.min_severity, Severity::High);
    assert_eq!(config.throttle_period, 300);
    assert_eq!(config.email_recipients.len(), 2);
    assert!(config.web_notification);
}

#[test]
fn test_queries() {
    let h = default_harness();
    h.alerts.submit_alert(report("192.168.1.20", AttackCategory::SqlInjection, Severity::High));
    h.alerts.submit_alert(report("192.168.1.21", AttackCategory::Xss, Severity::Low));
    h.alerts.submit_alert(report("192.168.1.20", AttackCategory::Xss, Severity::Medium));

    assert_eq!(h.alerts.alerts_by_severity(Severity::Low, 10).len(), 1);
    assert_eq!(h.alerts.alerts_by_category(AttackCategory::Xss, 10).len(), 2);
    assert_eq!(h.alerts.alerts_by_category(AttackCategory::Xss, 1)[0].severity, Severity::Medium);
    assert_eq!(h.alerts.alerts_by_ip(ip("192.168.1.20"), 10).len(), 2);
    // Destination matches too
    assert_eq!(h.alerts.alerts_by_ip(ip("10.0.0.2"), 10).len(), 3);
}

#[test]
fn test_alerts_by_timeframe() {
    let h = default_harness();
    h.alerts.submit_alert(report("192.168.1.30", AttackCategory::Ddos, Severity::High));
    h.clock.advance_secs(3 * 3600);
    h.alerts.submit_alert(report("192.168.1.31", AttackCategory::Ddos, Severity::High));

    let last_two_hours = h.alerts.alerts_by_timeframe(2, 100);
    assert_eq!(last_two_hours.len(), 1);
    assert_eq!(last_two_hours[0].src_ip, ip("192.168.1.31"));
    assert_eq!(h.alerts.alerts_by_timeframe(24, 100).len(), 2);
}

#[test]
fn test_stats_top_sources() {
    let h = default_harness();
    for i in 0..12u8 {
        let src = format!("192.168.1.{}", 100 + i);
        for _ in 0..=i {
            h.alerts.submit_alert(report(&src, AttackCategory::PortScan, Severity::Low));
        }
    }

    let stats = h.alerts.alert_stats();
    assert_eq!(stats.total, 78);
    assert_eq!(stats.severity[&Severity::Low], 78);
    assert_eq!(stats.severity[&Severity::Medium], 0);
    assert_eq!(stats.severity[&Severity::High], 0);
    assert_eq!(stats.categories[&AttackCategory::PortScan], 78);
    assert_eq!(stats.top_ips.len(), 10);
    assert_eq!(stats.top_ips[0].ip, ip("192.168.1.111"));
    assert_eq!(stats.top_ips[0].count, 12);
    assert_eq!(stats.top_ips[9].count, 3);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["severity"]["high"], 0);
}

#[test]
fn test_tick_purges_throttle_and_flushes_hourly() {
    let h = default_harness();
    h.alerts.submit_alert(report("192.168.1.40", AttackCategory::Ddos, Severity::High));
    assert_eq!(h.alerts.status().throttle_entries, 1);

    h.clock.advance_secs(300);
    h.alerts.tick().unwrap();
    assert_eq!(h.alerts.status().throttle_entries, 0);
    assert!(h.store.list_snapshots(SnapshotKind::Alerts).unwrap().is_empty());

    h.clock.advance_secs(3300);
    h.alerts.tick().unwrap();
    assert_eq!(h.store.list_snapshots(SnapshotKind::Alerts).unwrap().len(), 1);
}

#[test]
fn test_flush_skips_when_empty() {
    let h = default_harness();
    assert!(h.alerts.save_alerts().unwrap().is_none());
    h.alerts.flush();
    assert!(h.store.list_snapshots(SnapshotKind::Alerts).unwrap().is_empty());
}

#[tokio::test]
async fn test_lifecycle_flushes_on_stop() {
    let h = default_harness();
    let alerts = Arc::new(h.alerts);
    assert!(alerts.start());
    assert!(alerts.is_running());
    alerts.submit_alert(report("192.168.1.50", AttackCategory::Xss, Severity::High));

    assert!(alerts.stop().await);
    assert!(!alerts.stop().await);
    assert_eq!(h.store.list_snapshots(SnapshotKind::Alerts).unwrap().len(), 1);
}
