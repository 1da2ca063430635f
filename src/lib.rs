//! IDS Guard - network intrusion event-response core
//!
//! Turns detected threats and traffic readings into block decisions,
//! throttled alerts and live telemetry.

pub mod constants;
pub mod logic;
