//! Intrusion Prevention
//!
//! Per-source offense scoring and time-bounded blocking.
//!
//! # Components
//! - `types.rs`: `PreventionMode`, `PreventionConfig`, `BlockRecord`
//! - `controller.rs`: `PreventionController` (threat log, block list, sweep)
//! - `firewall.rs`: enforcement backends
//!
//! The persisted block list (`threats/blocked_ips.json`) is authoritative;
//! the in-memory blocked-set mirrors it for fast membership checks.

pub mod controller;
pub mod firewall;
pub mod types;

pub use controller::PreventionController;
pub use firewall::{CommandFirewall, Firewall, NullFirewall};
pub use types::{BlockRecord, PreventionConfig, PreventionMode, PreventionStatus};
