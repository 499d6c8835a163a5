use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerSnapshot;

/// On-disk form of a [`TimerSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(flatten)]
    pub snapshot: TimerSnapshot,
    pub saved_at: DateTime<Utc>,
    /// Execution context that wrote the entry.
    pub origin_id: String,
    pub was_foreground: bool,
}

impl PersistedSnapshot {
    pub fn new(
        snapshot: TimerSnapshot,
        saved_at: DateTime<Utc>,
        origin_id: impl Into<String>,
        was_foreground: bool,
    ) -> Self {
        Self {
            snapshot,
            saved_at,
            origin_id: origin_id.into(),
            was_foreground,
        }
    }

    /// Seconds since the entry was written. Never negative: an entry stamped
    /// in the future (clock moved backwards) counts as just written.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.saved_at).num_seconds().max(0)
    }

    /// Whether the entry is more than `ttl_secs` old, compared at millisecond
    /// precision. An entry exactly `ttl_secs` old is still fresh.
    pub fn is_older_than(&self, ttl_secs: i64, now: DateTime<Utc>) -> bool {
        (now - self.saved_at).num_milliseconds() > ttl_secs.saturating_mul(1000)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored payload, rejecting ones that deserialize but break the
    /// snapshot invariants.
    pub fn decode(raw: &str) -> Option<Self> {
        let parsed: Self = serde_json::from_str(raw).ok()?;
        parsed.snapshot.is_consistent().then_some(parsed)
    }
}
