//! Shared Event Vocabulary
//!
//! Category, severity and protocol names used by all three controllers,
//! plus the `SecurityEvent` record itself. Controllers never share state,
//! only these values.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SEVERITY
// ============================================================================

/// Event severity (ordered: Low < Medium < High)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a configured severity name; unknown names yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ATTACK CATEGORY
// ============================================================================

/// Attack / alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    SqlInjection,
    Xss,
    Ddos,
    PortScan,
    BruteForce,
    AnomalousTraffic,
    Malware,
    SuspiciousDownload,
}

impl AttackCategory {
    /// Categories tracked by the telemetry attack counters
    pub const TRACKED: [AttackCategory; 7] = [
        AttackCategory::SqlInjection,
        AttackCategory::Xss,
        AttackCategory::Ddos,
        AttackCategory::PortScan,
        AttackCategory::BruteForce,
        AttackCategory::AnomalousTraffic,
        AttackCategory::Malware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackCategory::SqlInjection => "sql_injection",
            AttackCategory::Xss => "xss",
            AttackCategory::Ddos => "ddos",
            AttackCategory::PortScan => "port_scan",
            AttackCategory::BruteForce => "brute_force",
            AttackCategory::AnomalousTraffic => "anomalous_traffic",
            AttackCategory::Malware => "malware",
            AttackCategory::SuspiciousDownload => "suspicious_download",
        }
    }

    /// Human readable label for notifications
    pub fn label(&self) -> &'static str {
        match self {
            AttackCategory::SqlInjection => "SQL Injection",
            AttackCategory::Xss => "XSS Attack",
            AttackCategory::Ddos => "DDoS Attack",
            AttackCategory::PortScan => "Port Scan",
            AttackCategory::BruteForce => "Brute Force",
            AttackCategory::AnomalousTraffic => "Anomalous Traffic",
            AttackCategory::Malware => "Virus/Trojan",
            AttackCategory::SuspiciousDownload => "Suspicious File Download",
        }
    }
}

impl fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROTOCOL
// ============================================================================

/// Protocol name, used both on events and in the protocol counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Http,
    Https,
    Icmp,
    Dns,
    #[serde(rename = "Other")]
    Other,
}

impl Protocol {
    pub const ALL: [Protocol; 7] = [
        Protocol::Tcp,
        Protocol::Udp,
        Protocol::Http,
        Protocol::Https,
        Protocol::Icmp,
        Protocol::Dns,
        Protocol::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Icmp => "ICMP",
            Protocol::Dns => "DNS",
            Protocol::Other => "Other",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACTION LABEL
// ============================================================================

/// What the pipeline did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Monitored,
    Blocked,
    Logged,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::Monitored => "monitored",
            ActionTaken::Blocked => "blocked",
            ActionTaken::Logged => "logged",
        }
    }
}

// ============================================================================
// EVENT REPORT (input from the event source)
// ============================================================================

/// A normalized record pushed in by the event source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReport {
    pub category: AttackCategory,
    pub severity: Severity,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub port: u16,
    pub protocol: Protocol,
    pub details: String,
}

impl EventReport {
    pub fn new(
        category: AttackCategory,
        severity: Severity,
        src_ip: IpAddr,
        dst_ip: IpAddr,
    ) -> Self {
        Self {
            category,
            severity,
            src_ip,
            dst_ip,
            port: 0,
            protocol: Protocol::Tcp,
            details: format!("Detected {} attempt", category.label()),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = details.to_string();
        self
    }
}

// ============================================================================
// SECURITY EVENT
// ============================================================================

/// Recorded threat or alert (immutable once recorded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: AttackCategory,
    pub severity: Severity,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub port: u16,
    pub protocol: Protocol,
    pub details: String,
    pub blocked: bool,
    pub action_taken: ActionTaken,
}

/// Threat handled by the mitigation controller
pub type ThreatEvent = SecurityEvent;

/// Alert handled by the notification controller
pub type AlertEvent = SecurityEvent;

impl SecurityEvent {
    /// Stamp a report as a threat record
    pub fn threat(report: EventReport, timestamp: DateTime<Utc>) -> Self {
        Self::from_report("THREAT", report, timestamp, ActionTaken::Monitored)
    }

    /// Stamp a report as an alert record
    pub fn alert(report: EventReport, timestamp: DateTime<Utc>) -> Self {
        Self::from_report("ALERT", report, timestamp, ActionTaken::Logged)
    }

    fn from_report(
        prefix: &str,
        report: EventReport,
        timestamp: DateTime<Utc>,
        action_taken: ActionTaken,
    ) -> Self {
        Self {
            id: new_event_id(prefix, timestamp),
            timestamp,
            category: report.category,
            severity: report.severity,
            src_ip: report.src_ip,
            dst_ip: report.dst_ip,
            port: report.port,
            protocol: report.protocol,
            details: report.details,
            blocked: false,
            action_taken,
        }
    }

    pub fn with_action(mut self, action: ActionTaken) -> Self {
        self.blocked = action == ActionTaken::Blocked;
        self.action_taken = action;
        self
    }
}

/// `PREFIX-<unix secs>-<8 hex>`
fn new_event_id(prefix: &str, timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, timestamp.timestamp(), &suffix[..8])
}

// ============================================================================
// TESTS
// ============================================================================
