//! Notification Throttle
//!
//! At most one notification per (source, category) per window. A key is
//! suppressed while `now - last < window`.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

use crate::logic::types::AttackCategory;

pub type ThrottleKey = (IpAddr, AttackCategory);

#[derive(Debug, Default)]
pub struct Throttle {
    last_notified: HashMap<ThrottleKey, DateTime<Utc>>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit and refresh the key, or reject while it is still in its window
    pub fn admit(&mut self, key: ThrottleKey, now: DateTime<Utc>, window: Duration) -> bool {
        if let Some(last) = self.last_notified.get(&key) {
            if now - *last < window {
                return false;
            }
        }
        self.last_notified.insert(key, now);
        true
    }

    /// Drop entries whose window has passed; returns how many
    pub fn purge(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.last_notified.len();
        self.last_notified.retain(|_, last| now - *last < window);
        before - self.last_notified.len()
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}
