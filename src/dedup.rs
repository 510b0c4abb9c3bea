//! Per-signal cooldown
//!
//! A key is eligible when it was never sent, or when at least `cooldown` has
//! passed since its last successful send. Callers record a send with
//! [`SignalDeduplicator::mark_sent`] only after the notifier confirmed it; a
//! crash between the two can therefore repeat one alert after a restart.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::signal::DedupKey;

/// Default cooldown between two sends of the same key (10 minutes)
pub const DEFAULT_COOLDOWN_SECS: i64 = 600;

#[derive(Debug, Clone)]
pub struct SignalDeduplicator {
    cooldown: Duration,
    last_sent: HashMap<DedupKey, DateTime<Utc>>,
}

impl Default for SignalDeduplicator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl SignalDeduplicator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: HashMap::new(),
        }
    }

    #[inline]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// True if `key` may be sent at `now`. Reaching the cooldown exactly is
    /// enough.
    pub fn should_emit(&self, key: &DedupKey, now: DateTime<Utc>) -> bool {
        match self.last_sent.get(key) {
            None => true,
            Some(&last) => now - last >= self.cooldown,
        }
    }

    /// Record a confirmed send
    pub fn mark_sent(&mut self, key: DedupKey, now: DateTime<Utc>) {
        self.last_sent.insert(key, now);
    }

    pub fn last_sent(&self, key: &DedupKey) -> Option<DateTime<Utc>> {
        self.last_sent.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }
}
