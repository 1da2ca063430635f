//! Email Notification Sinks
//!
//! `LogMailer` only records the request. `WebhookMailer` relays the message
//! as JSON to an HTTP mail gateway.

use std::time::Duration;

use serde::Serialize;

use crate::logic::error::{Error, Result};
use crate::logic::types::AlertEvent;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outgoing email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn for_alert(alert: &AlertEvent, recipients: &[String]) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let body = format!(
            "Security alert on {host}\n\n\
             Time: {}\n\
             Type: {}\n\
             Severity: {}\n\
             Source IP: {}\n\
             Target IP: {}\n\
             Port: {}\n\
             Protocol: {}\n\
             Details: {}\n\
             Action: {}\n",
            alert.timestamp.to_rfc3339(),
            alert.category.label(),
            alert.severity,
            alert.src_ip,
            alert.dst_ip,
            alert.port,
            alert.protocol,
            alert.details,
            alert.action_taken.as_str(),
        );

        Self {
            to: recipients.to_vec(),
            subject: format!("Security alert: {} - {}", alert.severity, alert.category.label()),
            body,
        }
    }
}

pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Records the request in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, message: &EmailMessage) -> Result<()> {
        log::info!("Email alert to: {}, subject: {}", message.to.join(", "), message.subject);
        Ok(())
    }
}

/// POSTs `{to, subject, body}` to a mail gateway
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    url: String,
}

impl WebhookMailer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Mailer for WebhookMailer {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(&self, message: &EmailMessage) -> Result<()> {
        let body = serde_json::to_string(message)?;

        let response = ureq::post(&self.url)
            .timeout(GATEWAY_TIMEOUT)
            .set("Content-Type", "application/json")
            .send_string(&body);

        match response {
            Ok(resp) => {
                log::info!("Email alert relayed to gateway ({})", resp.status());
                Ok(())
            }
            Err(e) => Err(Error::Notify { sink: "email", message: e.to_string() }),
        }
    }
}
