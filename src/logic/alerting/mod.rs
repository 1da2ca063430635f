//! Alert Notification
//!
//! # Components
//! - `types.rs`: `AlertConfig` (partial-merge config), `AlertStats`
//! - `throttle.rs`: per-(source, category) notification window
//! - `notify.rs`: email sinks (`LogMailer`, `WebhookMailer`)
//! - `controller.rs`: `AlertController`

pub mod controller;
pub mod notify;
pub mod throttle;
pub mod types;
#[cfg(test)]
mod tests;

pub use controller::AlertController;
pub use notify::{EmailMessage, LogMailer, Mailer, WebhookMailer};
pub use types::{AlertConfig, AlertStats, AlertingStatus, SourceCount};
