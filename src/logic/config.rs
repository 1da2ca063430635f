//! Runtime Configuration
//!
//! Environment variables (optionally from `.env`) with defaults. Values that
//! fail validation fall back to the default with a warning.

use std::env;
use std::path::PathBuf;

use crate::constants;
use crate::logic::alerting::types::split_recipients;
use crate::logic::alerting::AlertConfig;
use crate::logic::prevention::{PreventionConfig, PreventionMode};
use crate::logic::types::Severity;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the snapshot store
    pub data_dir: PathBuf,

    pub prevention: PreventionConfig,

    pub alerting: AlertConfig,

    /// Mail gateway for email alerts (unset = log only)
    pub mail_gateway_url: Option<String>,

    /// Program the host firewall on block decisions
    pub firewall_enforce: bool,

    /// Run the demonstration event generator
    pub simulate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::DEFAULT_DATA_DIR.clone(),
            prevention: PreventionConfig::default(),
            alerting: AlertConfig::default(),
            mail_gateway_url: None,
            firewall_enforce: false,
            simulate: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let prevention = PreventionConfig {
            mode: parse_or(
                &get,
                "IDS_PREVENTION_MODE",
                defaults.prevention.mode,
                PreventionMode::parse,
            ),
            block_threshold: parse_or(
                &get,
                "IDS_BLOCK_THRESHOLD",
                defaults.prevention.block_threshold,
                |v| v.parse::<u32>().ok().filter(|t| *t > 0),
            ),
            block_duration_mins: parse_or(
                &get,
                "IDS_BLOCK_DURATION_MINS",
                defaults.prevention.block_duration_mins,
                |v| v.parse::<u64>().ok(),
            ),
        };

        let alerting = AlertConfig {
            web_notification: parse_or(
                &get,
                "IDS_WEB_NOTIFICATION",
                defaults.alerting.web_notification,
                parse_bool,
            ),
            email_notification: parse_or(
                &get,
                "IDS_EMAIL_NOTIFICATION",
                defaults.alerting.email_notification,
                parse_bool,
            ),
            email_recipients: get("IDS_EMAIL_RECIPIENTS")
                .map(|v| split_recipients(&v))
                .unwrap_or_default(),
            min_severity: parse_or(
                &get,
                "IDS_MIN_SEVERITY",
                defaults.alerting.min_severity,
                Severity::parse,
            ),
            alert_throttling: parse_or(
                &get,
                "IDS_ALERT_THROTTLING",
                defaults.alerting.alert_throttling,
                parse_bool,
            ),
            throttle_period: parse_or(
                &get,
                "IDS_THROTTLE_SECS",
                defaults.alerting.throttle_period,
                |v| v.parse::<u64>().ok().filter(|p| *p > 0),
            ),
        };

        Self {
            data_dir: get("IDS_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            prevention,
            alerting,
            mail_gateway_url: get("IDS_MAIL_GATEWAY_URL"),
            firewall_enforce: parse_or(
                &get,
                "IDS_FIREWALL_ENFORCE",
                defaults.firewall_enforce,
                parse_bool,
            ),
            simulate: parse_or(&get, "IDS_SIMULATE", defaults.simulate, parse_bool),
        }
    }
}

fn parse_or<T, G, P>(get: &G, key: &str, default: T, parse: P) -> T
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match get(key) {
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            log::warn!("Invalid value for {}: '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
