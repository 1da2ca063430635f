//! Prevention Types

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// MODE
// ============================================================================

/// Blocking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreventionMode {
    /// Record only, never block
    Monitor,
    /// Block once a source reaches the offense threshold
    Auto,
    /// Block on the first high-severity threat
    Strict,
}

impl PreventionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreventionMode::Monitor => "monitor",
            PreventionMode::Auto => "auto",
            PreventionMode::Strict => "strict",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monitor" => Some(PreventionMode::Monitor),
            "auto" => Some(PreventionMode::Auto),
            "strict" => Some(PreventionMode::Strict),
            _ => None,
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreventionConfig {
    pub mode: PreventionMode,
    /// Offenses before auto mode blocks (>= 1)
    pub block_threshold: u32,
    /// Block lifetime in minutes (0 = reaped on next sweep)
    pub block_duration_mins: u64,
}

impl Default for PreventionConfig {
    fn default() -> Self {
        Self {
            mode: PreventionMode::Auto,
            block_threshold: 3,
            block_duration_mins: 60,
        }
    }
}

// ============================================================================
// BLOCK RECORD
// ============================================================================

/// Persisted block; the list of these is the authoritative block state.
/// Field names are the on-disk schema. Times are written as RFC 3339 and
/// read as RFC 3339, naive ISO 8601 (local time) or epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub ip: IpAddr,
    #[serde(deserialize_with = "any_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub threat_id: Option<String>,
    /// Minutes
    pub duration: u64,
    #[serde(deserialize_with = "any_time")]
    pub expiry: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Seconds(f64),
    Text(String),
}

fn any_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    use serde::de::Error as _;

    match RawTime::deserialize(deserializer)? {
        RawTime::Seconds(secs) => from_epoch(secs)
            .ok_or_else(|| D::Error::custom(format!("epoch seconds out of range: {}", secs))),
        RawTime::Text(text) => from_text(&text)
            .ok_or_else(|| D::Error::custom(format!("unrecognized time: {}", text))),
    }
}

fn from_epoch(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn from_text(text: &str) -> Option<DateTime<Utc>> {
    use chrono::{Local, NaiveDateTime, TimeZone};

    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .or_else(|| Some(naive.and_utc()))
}

impl BlockRecord {
    pub fn new(
        ip: IpAddr,
        threat_id: Option<String>,
        duration_mins: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let expiry = i64::try_from(duration_mins)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            ip,
            timestamp: now,
            threat_id,
            duration: duration_mins,
            expiry,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PreventionStatus {
    pub is_running: bool,
    pub mode: PreventionMode,
    pub block_threshold: u32,
    pub block_duration_mins: u64,
    pub threats_detected: u64,
    pub blocks_issued: u64,
    pub active_blocks: usize,
    pub tracked_sources: usize,
}
