//! Alert Notification Controller
//!
//! Every submitted alert is recorded; only admitted ones are forwarded.
//! Admission is a severity floor followed by a per-(source, category)
//! throttle window. Email goes through a delivery thread so a slow or
//! unreachable gateway never holds up submission.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use super::notify::{EmailMessage, LogMailer, Mailer};
use super::throttle::Throttle;
use super::types::{AlertConfig, AlertStats, AlertingStatus, SourceCount};
use crate::constants::{
    ALERTING_BACKOFF, ALERTING_INTERVAL, ALERT_FLUSH_SECS, ALERT_LOG_CAPACITY,
    ALERT_SNAPSHOT_SIZE, MAIL_QUEUE_CAPACITY, TOP_ALERT_SOURCES,
};
use crate::logic::buffer::BoundedLog;
use crate::logic::clock::{self, Clock};
use crate::logic::dispatch::Dispatcher;
use crate::logic::error::Result;
use crate::logic::events::{self, names, LiveSink};
use crate::logic::store::{SnapshotKind, SnapshotStore};
use crate::logic::types::{AlertEvent, AttackCategory, EventReport, SecurityEvent, Severity};
use crate::logic::worker::{Periodic, Schedule, Worker};

// ============================================================================
// STATE
// ============================================================================

struct AlertState {
    config: AlertConfig,
    alerts: BoundedLog<AlertEvent>,
    throttle: Throttle,
    notifications_sent: u64,
    suppressed: u64,
    last_flush: DateTime<Utc>,
}

/// What to deliver once the lock is released
struct Delivery {
    web: bool,
    email_to: Option<Vec<String>>,
}

/// Outcomes reported by the mail delivery thread
#[derive(Default)]
struct MailCounters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

fn mail_queue(mailer: Arc<dyn Mailer>, counters: Arc<MailCounters>) -> Dispatcher<EmailMessage> {
    Dispatcher::spawn("mail-delivery", MAIL_QUEUE_CAPACITY, move |message: EmailMessage| {
        match mailer.send(&message) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("Failed to send email alert via {}: {}", mailer.name(), e);
            }
        }
    })
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct AlertController {
    state: Mutex<AlertState>,
    store: SnapshotStore,
    sink: Option<Arc<dyn LiveSink>>,
    mail: Dispatcher<EmailMessage>,
    mail_counters: Arc<MailCounters>,
    clock: Arc<dyn Clock>,
    worker: Worker,
}

impl AlertController {
    pub fn new(config: AlertConfig, store: SnapshotStore) -> Self {
        let clock = clock::system();
        let mail_counters = Arc::new(MailCounters::default());
        Self {
            state: Mutex::new(AlertState {
                config,
                alerts: BoundedLog::new(ALERT_LOG_CAPACITY),
                throttle: Throttle::new(),
                notifications_sent: 0,
                suppressed: 0,
                last_flush: clock.now(),
            }),
            store,
            sink: None,
            mail: mail_queue(Arc::new(LogMailer), Arc::clone(&mail_counters)),
            mail_counters,
            clock,
            worker: Worker::new(Schedule::new(ALERTING_INTERVAL, ALERTING_BACKOFF)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LiveSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces the delivery thread; the previous one exits once drained
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mail = mail_queue(mailer, Arc::clone(&self.mail_counters));
        self
    }

    /// Also resets the flush schedule to the new clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.get_mut().last_flush = clock.now();
        self.clock = clock;
        self
    }

    // ------------------------------------------------------------------------
    // LIFECYCLE
    // ------------------------------------------------------------------------

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
    // SUBMISSION
    // ------------------------------------------------------------------------

    /// Record an alert and forward it if admitted. Returns false only when an
    /// email could not be queued; gateway failures are logged by the delivery
    /// thread and counted in `status`.
    pub fn submit_alert(&self, report: EventReport) -> bool {
        let now = self.clock.now();
        let alert = SecurityEvent::alert(report, now);

        let delivery = {
            let mut state = self.state.lock();
            state.alerts.push(alert.clone());

            let admitted = Self::admit(&mut state, &alert, now);
            log::info!(
                "Alert processed: {}, severity: {}, source: {}{}",
                alert.category,
                alert.severity,
                alert.src_ip,
                if admitted { "" } else { " (suppressed)" }
            );

            if admitted {
                state.notifications_sent += 1;
                let config = &state.config;
                Some(Delivery {
                    web: config.web_notification,
                    email_to: (config.email_notification && !config.email_recipients.is_empty())
                        .then(|| config.email_recipients.clone()),
                })
            } else {
                state.suppressed += 1;
                None
            }
        };

        match delivery {
            Some(delivery) => self.deliver(&alert, delivery),
            None => true,
        }
    }

    fn admit(state: &mut AlertState, alert: &AlertEvent, now: DateTime<Utc>) -> bool {
        if alert.severity < state.config.min_severity {
            return false;
        }
        if !state.config.alert_throttling {
            return true;
        }
        let window = throttle_window(&state.config);
        state.throttle.admit((alert.src_ip, alert.category), now, window)
    }

    fn deliver(&self, alert: &AlertEvent, delivery: Delivery) -> bool {
        if delivery.web {
            events::emit(self.sink.as_deref(), names::NEW_ALERT, alert);
        }

        match delivery.email_to {
            Some(recipients) => self.mail.submit(EmailMessage::for_alert(alert, &recipients)),
            None => true,
        }
    }

    // ------------------------------------------------------------------------
    // MAINTENANCE
    // ------------------------------------------------------------------------

    /// Drop throttle entries whose window has passed
    pub fn purge_throttle(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let window = throttle_window(&state.config);
        let purged = state.throttle.purge(now, window);
        if purged > 0 {
            log::debug!("Purged {} throttle entries", purged);
        }
        purged
    }

    /// Write the most recent alerts to `alerts/alerts_<ts>.json`
    pub fn save_alerts(&self) -> Result<Option<PathBuf>> {
        let alerts = self.state.lock().alerts.tail(ALERT_SNAPSHOT_SIZE);
        if alerts.is_empty() {
            return Ok(None);
        }
        let path = self.store.write_snapshot(SnapshotKind::Alerts, &alerts, self.clock.now())?;
        Ok(Some(path))
    }

    // ------------------------------------------------------------------------
    // CONFIGURATION
    // ------------------------------------------------------------------------

    /// Partial merge; false only for an empty or non-object patch
    pub fn update_config(&self, patch: &Value) -> bool {
        let Some(fields) = patch.as_object().filter(|o| !o.is_empty()) else {
            return false;
        };

        let applied = self.state.lock().config.merge(fields);
        log::info!("Alert configuration updated ({})", applied.join(", "));
        true
    }

    pub fn config(&self) -> AlertConfig {
        self.state.lock().config.clone()
    }

    // ------------------------------------------------------------------------
    // QUERIES
    // ------------------------------------------------------------------------

    pub fn recent_alerts(&self, limit: usize) -> Vec<AlertEvent> {
        self.state.lock().alerts.tail(limit)
    }

    pub fn alerts_by_severity(&self, severity: Severity, limit: usize) -> Vec<AlertEvent> {
        self.state.lock().alerts.tail_filtered(limit, |a| a.severity == severity)
    }

    pub fn alerts_by_category(&self, category: AttackCategory, limit: usize) -> Vec<AlertEvent> {
        self.state.lock().alerts.tail_filtered(limit, |a| a.category == category)
    }

    /// Alerts where the address is the source or the destination
    pub fn alerts_by_ip(&self, ip: IpAddr, limit: usize) -> Vec<AlertEvent> {
        self.state.lock().alerts.tail_filtered(limit, |a| a.src_ip == ip || a.dst_ip == ip)
    }

    /// Alerts from the last `hours` hours
    pub fn alerts_by_timeframe(&self, hours: u32, limit: usize) -> Vec<AlertEvent> {
        let since = self
            .clock
            .now()
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.state.lock().alerts.tail_filtered(limit, |a| a.timestamp >= since)
    }

    pub fn alert_stats(&self) -> AlertStats {
        let state = self.state.lock();

        let mut severity: BTreeMap<Severity, u64> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut categories: BTreeMap<AttackCategory, u64> = BTreeMap::new();
        let mut sources: HashMap<IpAddr, u64> = HashMap::new();

        for alert in state.alerts.iter() {
            *severity.entry(alert.severity).or_insert(0) += 1;
            *categories.entry(alert.category).or_insert(0) += 1;
            *sources.entry(alert.src_ip).or_insert(0) += 1;
        }

        let mut top_ips: Vec<SourceCount> =
            sources.into_iter().map(|(ip, count)| SourceCount { ip, count }).collect();
        top_ips.sort_by(|a, b| b.count.cmp(&a.count).then(a.ip.cmp(&b.ip)));
        top_ips.truncate(TOP_ALERT_SOURCES);

        AlertStats {
            total: state.alerts.len(),
            severity,
            categories,
            top_ips,
        }
    }

    pub fn status(&self) -> AlertingStatus {
        let state = self.state.lock();
        AlertingStatus {
            is_running: self.worker.is_running(),
            total_alerts: state.alerts.len(),
            notifications_sent: state.notifications_sent,
            suppressed: state.suppressed,
            throttle_entries: state.throttle.len(),
            emails_delivered: self.mail_counters.delivered.load(Ordering::Relaxed),
            email_failures: self.mail_counters.failed.load(Ordering::Relaxed),
        }
    }
}

fn throttle_window(config: &AlertConfig) -> Duration {
    i64::try_from(config.throttle_period)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

impl Periodic for AlertController {
    fn name(&self) -> &'static str {
        "Alert notification"
    }

    fn tick(&self) -> Result<()> {
        self.purge_throttle();

        let now = self.clock.now();
        let due = {
            let mut state = self.state.lock();
            let due = now - state.last_flush >= Duration::seconds(ALERT_FLUSH_SECS);
            if due {
                state.last_flush = now;
            }
            due
        };

        if due {
            self.save_alerts()?;
        }
        Ok(())
    }

    fn flush(&self) {
        if let Err(e) = self.save_alerts() {
            log::error!("Failed to save alert data: {}", e);
        }
    }
}
