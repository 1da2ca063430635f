//! Alerting Types

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logic::types::{AttackCategory, Severity};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub web_notification: bool,
    pub email_notification: bool,
    pub email_recipients: Vec<String>,
    pub min_severity: Severity,
    pub alert_throttling: bool,
    /// Seconds (> 0)
    pub throttle_period: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            web_notification: true,
            email_notification: false,
            email_recipients: Vec::new(),
            min_severity: Severity::Medium,
            alert_throttling: true,
            throttle_period: 300,
        }
    }
}

impl AlertConfig {
    /// Merge a partial JSON patch; every field is validated on its own and
    /// invalid values are skipped. Returns the names of applied fields.
    pub fn merge(&mut self, patch: &serde_json::Map<String, Value>) -> Vec<&'static str> {
        let mut applied = Vec::new();

        if let Some(v) = patch.get("web_notification") {
            self.web_notification = truthy(v);
            applied.push("web_notification");
        }

        if let Some(v) = patch.get("email_notification") {
            self.email_notification = truthy(v);
            applied.push("email_notification");
        }

        if let Some(v) = patch.get("email_recipients") {
            if let Some(recipients) = parse_recipients(v) {
                self.email_recipients = recipients;
                applied.push("email_recipients");
            }
        }

        if let Some(severity) = patch
            .get("min_severity")
            .and_then(Value::as_str)
            .and_then(|s| Severity::ALL.into_iter().find(|l| l.as_str() == s))
        {
            self.min_severity = severity;
            applied.push("min_severity");
        }

        if let Some(v) = patch.get("alert_throttling") {
            self.alert_throttling = truthy(v);
            applied.push("alert_throttling");
        }

        if let Some(period) = patch.get("throttle_period").and_then(parse_period) {
            self.throttle_period = period;
            applied.push("throttle_period");
        }

        applied
    }
}

/// Loose boolean: false, 0, "", null and empty collections are false
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A list of addresses or one comma-separated string
pub fn parse_recipients(v: &Value) -> Option<Vec<String>> {
    match v {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        Value::String(s) => Some(split_recipients(s)),
        _ => None,
    }
}

pub fn split_recipients(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

/// Whole seconds > 0, from an integer, a float (truncated) or a numeric string
fn parse_period(v: &Value) -> Option<u64> {
    let secs = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    u64::try_from(secs).ok().filter(|&s| s > 0)
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCount {
    pub ip: IpAddr,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStats {
    pub total: usize,
    /// Always carries all three levels
    pub severity: BTreeMap<Severity, u64>,
    pub categories: BTreeMap<AttackCategory, u64>,
    /// Most active sources, count descending
    pub top_ips: Vec<SourceCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertingStatus {
    pub is_running: bool,
    pub total_alerts: usize,
    pub notifications_sent: u64,
    pub suppressed: u64,
    pub throttle_entries: usize,
    pub emails_delivered: u64,
    pub email_failures: u64,
}
