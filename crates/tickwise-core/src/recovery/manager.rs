//! Two-tier snapshot persistence with wall-clock drift correction.
//!
//! Every save lands in both tiers. Restores read the tab-scoped tier first
//! and fall back to the shared durable slot, each judged against its own
//! time-to-live. Whatever comes back has `remaining` recomputed from
//! wall-clock timestamps; the number of ticks that happened to fire while
//! the context was alive is never trusted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persisted::PersistedSnapshot;
use super::stats::RecoveryStats;
use super::store::SnapshotStore;
use crate::error::StorageError;
use crate::time::TimeSource;
use crate::timer::TimerSnapshot;

/// Session-tier keys are this prefix followed by the origin id.
pub const SESSION_KEY_PREFIX: &str = "tickwise.session.";
const DURABLE_KEY: &str = "tickwise.timer";
const STATS_KEY: &str = "tickwise.recovery-stats";

/// Tunables for persistence and recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum age of a tab-scoped entry.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
    /// Maximum age of the shared durable entry.
    #[serde(default = "default_durable_ttl")]
    pub durable_ttl_secs: i64,
    /// Largest disagreement between two elapsed-time estimates that still
    /// counts as plausible.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance_secs: i64,
    /// Health ratio below which recovery is reported as degraded.
    #[serde(default = "default_health_threshold")]
    pub health_threshold: f64,
    /// Ticks between opportunistic saves while running.
    #[serde(default = "default_persist_every_ticks")]
    pub persist_every_ticks: u32,
}

fn default_session_ttl() -> i64 {
    5 * 60
}
fn default_durable_ttl() -> i64 {
    10 * 60
}
fn default_drift_tolerance() -> i64 {
    2
}
fn default_health_threshold() -> f64 {
    0.8
}
fn default_persist_every_ticks() -> u32 {
    5
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            durable_ttl_secs: default_durable_ttl(),
            drift_tolerance_secs: default_drift_tolerance(),
            health_threshold: default_health_threshold(),
            persist_every_ticks: default_persist_every_ticks(),
        }
    }
}

/// Persistence scope, in restore priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryTier {
    /// Private to one execution context.
    Session,
    /// One slot shared by every context, last write wins.
    Durable,
}

impl RecoveryTier {
    pub const ALL: [RecoveryTier; 2] = [RecoveryTier::Session, RecoveryTier::Durable];
}

/// A snapshot handed back by [`RecoveryManager::restore`], already
/// drift-corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub snapshot: TimerSnapshot,
    pub tier: RecoveryTier,
    /// Context that wrote the entry.
    pub written_by: String,
    pub saved_at: DateTime<Utc>,
    pub age_secs: i64,
    /// Seconds deducted from `remaining` by drift correction.
    pub elapsed_secs: i64,
    /// The countdown ran out while nobody was ticking it. The caller owes
    /// one completion transition.
    pub expired_while_away: bool,
    /// The drift validator found the timestamps implausible.
    pub anomaly: bool,
}

/// Result of recomputing a snapshot's remainder from wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftCorrection {
    pub snapshot: TimerSnapshot,
    pub elapsed_secs: i64,
    pub expired: bool,
}

/// Recompute `remaining` for a snapshot that may have been running while
/// nothing was ticking.
///
/// Running snapshots lose `now - last_start_time` seconds (falling back to
/// `saved_at` when no start time was recorded). If that exhausts the
/// interval the snapshot comes back stopped at zero; otherwise it comes back
/// running, re-anchored at `now`. Paused and idle snapshots are returned
/// as-is.
pub fn correct_drift(
    snapshot: &TimerSnapshot,
    saved_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DriftCorrection {
    let mut corrected = snapshot.clone();
    if !snapshot.is_running {
        return DriftCorrection {
            snapshot: corrected,
            elapsed_secs: 0,
            expired: false,
        };
    }

    let anchor = snapshot.last_start_time.unwrap_or(saved_at);
    let elapsed = (now - anchor).num_seconds().max(0);
    let remaining = i64::from(snapshot.remaining).saturating_sub(elapsed).max(0);
    corrected.remaining = u32::try_from(remaining).unwrap_or(0);

    let expired = corrected.remaining == 0;
    if expired {
        corrected.mark_idle();
    } else {
        corrected.mark_running(now);
    }
    DriftCorrection {
        snapshot: corrected,
        elapsed_secs: elapsed,
        expired,
    }
}

enum TierRead {
    Empty,
    Hit(PersistedSnapshot),
    Expired { age_secs: i64 },
    Corrupt,
    Unreadable(StorageError),
}

/// Owns the two persistence tiers for one execution context.
pub struct RecoveryManager {
    session: Box<dyn SnapshotStore>,
    durable: Box<dyn SnapshotStore>,
    origin_id: String,
    foreground: bool,
    config: RecoveryConfig,
    time: Arc<dyn TimeSource>,
}

impl RecoveryManager {
    pub fn new(
        session: Box<dyn SnapshotStore>,
        durable: Box<dyn SnapshotStore>,
        origin_id: impl Into<String>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self::with_config(session, durable, origin_id, time, RecoveryConfig::default())
    }

    pub fn with_config(
        session: Box<dyn SnapshotStore>,
        durable: Box<dyn SnapshotStore>,
        origin_id: impl Into<String>,
        time: Arc<dyn TimeSource>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            session,
            durable,
            origin_id: origin_id.into(),
            foreground: true,
            config,
            time,
        }
    }

    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    /// Record whether this context is currently visible. Stamped onto every
    /// subsequent save.
    pub fn set_foreground(&mut self, foreground: bool) {
        self.foreground = foreground;
    }

    /// Write `snapshot` to both tiers.
    ///
    /// Failures are logged and swallowed; the return value only says whether
    /// every tier accepted the write.
    pub fn save(&self, snapshot: &TimerSnapshot) -> bool {
        let entry = PersistedSnapshot::new(
            snapshot.clone(),
            self.time.now(),
            self.origin_id.clone(),
            self.foreground,
        );
        let payload = match entry.encode() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode timer snapshot");
                return false;
            }
        };

        let mut all_written = true;
        for tier in RecoveryTier::ALL {
            if let Err(e) = self.store(tier).write(&self.key(tier), &payload) {
                tracing::warn!(?tier, error = %e, "failed to persist timer snapshot");
                all_written = false;
            }
        }
        all_written
    }

    /// Find the freshest usable snapshot and drift-correct it.
    ///
    /// Expired and corrupt entries met along the way are deleted. `None`
    /// means no tier had anything usable.
    pub fn restore(&self) -> Option<RestoreOutcome> {
        let now = self.time.now();
        let mut found_stale = false;

        for tier in RecoveryTier::ALL {
            match self.read_tier(tier, now) {
                TierRead::Empty => {}
                TierRead::Hit(entry) => {
                    let outcome = self.build_outcome(tier, entry, now);
                    self.update_stats(|stats| {
                        stats.record_success(now);
                        if outcome.anomaly {
                            stats.record_anomaly();
                        }
                    });
                    tracing::info!(
                        ?tier,
                        remaining = outcome.snapshot.remaining,
                        elapsed = outcome.elapsed_secs,
                        expired = outcome.expired_while_away,
                        "restored timer snapshot"
                    );
                    return Some(outcome);
                }
                TierRead::Expired { age_secs } => {
                    tracing::debug!(?tier, age_secs, "discarding expired timer snapshot");
                    self.discard(tier);
                    found_stale = true;
                }
                TierRead::Corrupt => {
                    tracing::warn!(?tier, "discarding unreadable timer snapshot");
                    self.discard(tier);
                    found_stale = true;
                }
                TierRead::Unreadable(e) => {
                    tracing::warn!(?tier, error = %e, "failed to read timer snapshot");
                    found_stale = true;
                }
            }
        }

        if found_stale {
            self.update_stats(|stats| stats.record_failure(now));
        }
        None
    }

    /// Whether two second counts agree within the drift tolerance.
    ///
    /// Purely diagnostic: callers record the answer, they never refuse a
    /// restore because of it.
    pub fn validate(&self, expected_remaining: i64, actual_elapsed_seconds: i64) -> bool {
        expected_remaining.abs_diff(actual_elapsed_seconds)
            <= self.config.drift_tolerance_secs.unsigned_abs()
    }

    /// Remove this context's entries from both tiers.
    pub fn clear(&self) {
        for tier in RecoveryTier::ALL {
            self.discard(tier);
        }
    }

    pub fn stats(&self) -> RecoveryStats {
        match self.durable.read(STATS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => RecoveryStats::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read recovery stats");
                RecoveryStats::default()
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.stats().is_healthy(self.config.health_threshold)
    }

    pub fn reset_stats(&self) {
        if let Err(e) = self.durable.remove(STATS_KEY) {
            tracing::warn!(error = %e, "failed to reset recovery stats");
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn store(&self, tier: RecoveryTier) -> &dyn SnapshotStore {
        match tier {
            RecoveryTier::Session => self.session.as_ref(),
            RecoveryTier::Durable => self.durable.as_ref(),
        }
    }

    fn key(&self, tier: RecoveryTier) -> String {
        match tier {
            RecoveryTier::Session => format!("{SESSION_KEY_PREFIX}{}", self.origin_id),
            RecoveryTier::Durable => DURABLE_KEY.to_string(),
        }
    }

    fn ttl_secs(&self, tier: RecoveryTier) -> i64 {
        match tier {
            RecoveryTier::Session => self.config.session_ttl_secs,
            RecoveryTier::Durable => self.config.durable_ttl_secs,
        }
    }

    fn read_tier(&self, tier: RecoveryTier, now: DateTime<Utc>) -> TierRead {
        let raw = match self.store(tier).read(&self.key(tier)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return TierRead::Empty,
            Err(e) => return TierRead::Unreadable(e),
        };
        let Some(entry) = PersistedSnapshot::decode(&raw) else {
            return TierRead::Corrupt;
        };
        if entry.is_older_than(self.ttl_secs(tier), now) {
            return TierRead::Expired {
                age_secs: entry.age_secs(now),
            };
        }
        TierRead::Hit(entry)
    }

    fn build_outcome(
        &self,
        tier: RecoveryTier,
        entry: PersistedSnapshot,
        now: DateTime<Utc>,
    ) -> RestoreOutcome {
        let age_secs = entry.age_secs(now);
        let drift = correct_drift(&entry.snapshot, entry.saved_at, now);
        let anomaly = self.is_anomalous(&entry, now);
        if anomaly {
            tracing::warn!(
                ?tier,
                age_secs,
                elapsed = drift.elapsed_secs,
                "restored snapshot timestamps disagree beyond tolerance"
            );
        }
        RestoreOutcome {
            snapshot: drift.snapshot,
            tier,
            written_by: entry.origin_id,
            saved_at: entry.saved_at,
            age_secs,
            elapsed_secs: drift.elapsed_secs,
            expired_while_away: drift.expired,
            anomaly,
        }
    }

    /// Compare the remainder implied by the start anchor with the remainder
    /// implied by the save time. Writers re-anchor on every save, so the two
    /// should agree; a large gap means a skewed or stepped system clock.
    fn is_anomalous(&self, entry: &PersistedSnapshot, now: DateTime<Utc>) -> bool {
        let snapshot = &entry.snapshot;
        let Some(start) = snapshot.last_start_time.filter(|_| snapshot.is_running) else {
            return false;
        };
        if start > now || entry.saved_at > now {
            return true;
        }
        let remaining = i64::from(snapshot.remaining);
        let by_anchor = (remaining - (now - start).num_seconds()).max(0);
        let by_save = (remaining - entry.age_secs(now)).max(0);
        !self.validate(by_anchor, by_save)
    }

    fn discard(&self, tier: RecoveryTier) {
        if let Err(e) = self.store(tier).remove(&self.key(tier)) {
            tracing::warn!(?tier, error = %e, "failed to remove timer snapshot");
        }
    }

    fn update_stats(&self, apply: impl FnOnce(&mut RecoveryStats)) {
        let mut stats = self.stats();
        apply(&mut stats);
        let written = serde_json::to_string(&stats)
            .map_err(|e| e.to_string())
            .and_then(|raw| self.durable.write(STATS_KEY, &raw).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to persist recovery stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::store::MemoryStore;
    use crate::time::ManualTime;
    use crate::timer::{TimerMode, TimerSettings};
    use chrono::Duration;

    struct Fixture {
        session: Arc<MemoryStore>,
        durable: Arc<MemoryStore>,
        time: ManualTime,
        manager: RecoveryManager,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(MemoryStore::new());
        let durable = Arc::new(MemoryStore::new());
        let time = ManualTime::starting_now();
        let manager = RecoveryManager::new(
            Box::new(Arc::clone(&session)),
            Box::new(Arc::clone(&durable)),
            "tab-a",
            Arc::new(time.clone()),
        );
        Fixture {
            session,
            durable,
            time,
            manager,
        }
    }

    fn running(remaining: u32, started: DateTime<Utc>) -> TimerSnapshot {
        let mut snap = TimerSnapshot::initial(&TimerSettings::default());
        snap.remaining = remaining;
        snap.mark_running(started);
        snap
    }

    #[test]
    fn idle_round_trip() {
        let f = fixture();
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        assert!(f.manager.save(&snap));

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.tier, RecoveryTier::Session);
        assert_eq!(outcome.snapshot, snap);
        assert_eq!(outcome.written_by, "tab-a");
        assert!(!outcome.anomaly);
    }

    #[test]
    fn running_round_trip_keeps_remaining() {
        let f = fixture();
        let snap = running(1000, f.time.now());
        f.manager.save(&snap);

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.snapshot.remaining, 1000);
        assert!(outcome.snapshot.is_running);
        assert_eq!(outcome.snapshot.last_start_time, Some(f.time.now()));
    }

    #[test]
    fn drift_is_deducted_from_wall_clock() {
        let f = fixture();
        let now = f.time.now();
        f.manager.save(&running(1200, now - Duration::milliseconds(300_000)));

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.snapshot.remaining, 900);
        assert_eq!(outcome.elapsed_secs, 300);
        assert!(outcome.snapshot.is_running);
        assert_eq!(outcome.snapshot.last_start_time, Some(now));
        // Anchor says 300 s passed, save time says none did.
        assert!(outcome.anomaly);
        assert_eq!(f.manager.stats().anomalies, 1);
    }

    #[test]
    fn expiry_during_absence_stops_at_zero() {
        let f = fixture();
        let now = f.time.now();
        f.manager.save(&running(20, now - Duration::milliseconds(30_000)));

        let outcome = f.manager.restore().unwrap();
        assert!(outcome.expired_while_away);
        assert_eq!(outcome.snapshot.remaining, 0);
        assert!(!outcome.snapshot.is_running);
        assert!(outcome.snapshot.last_start_time.is_none());
    }

    #[test]
    fn paused_snapshot_is_returned_unchanged() {
        let f = fixture();
        let mut snap = running(500, f.time.now());
        snap.mark_paused();
        f.manager.save(&snap);
        f.time.advance_secs(120);

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.snapshot, snap);
        assert_eq!(outcome.elapsed_secs, 0);
    }

    #[test]
    fn session_tier_wins_over_durable() {
        let f = fixture();
        f.manager.save(&running(100, f.time.now()));

        let other = TimerSnapshot {
            mode: TimerMode::LongBreak,
            ..TimerSnapshot::initial(&TimerSettings::default())
        };
        let entry = PersistedSnapshot::new(other, f.time.now(), "tab-b", true);
        f.durable
            .write(DURABLE_KEY, &entry.encode().unwrap())
            .unwrap();

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.tier, RecoveryTier::Session);
        assert_eq!(outcome.snapshot.mode, TimerMode::Focus);
    }

    #[test]
    fn expired_session_falls_back_to_durable_and_is_deleted() {
        let f = fixture();
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        f.manager.save(&snap);
        f.time.advance_secs(6 * 60);

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.tier, RecoveryTier::Durable);
        assert_eq!(outcome.age_secs, 360);
        assert!(f.session.read("tickwise.session.tab-a").unwrap().is_none());
    }

    #[test]
    fn session_entry_just_past_ttl_is_skipped() {
        let f = fixture();
        f.manager.save(&TimerSnapshot::initial(&TimerSettings::default()));

        f.time.advance_secs(300);
        assert_eq!(f.manager.restore().unwrap().tier, RecoveryTier::Session);

        f.time.advance(Duration::milliseconds(1));
        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.tier, RecoveryTier::Durable);
        assert!(f.session.read("tickwise.session.tab-a").unwrap().is_none());
    }

    #[test]
    fn everything_expired_returns_none_and_purges() {
        let f = fixture();
        f.manager.save(&TimerSnapshot::initial(&TimerSettings::default()));
        f.time.advance_secs(11 * 60);

        assert!(f.manager.restore().is_none());
        assert!(f.session.is_empty());
        assert!(f.durable.read(DURABLE_KEY).unwrap().is_none());
        assert_eq!(f.manager.stats().failures, 1);
    }

    #[test]
    fn corrupt_payload_is_treated_as_absent() {
        let f = fixture();
        f.session
            .write("tickwise.session.tab-a", "{\"mode\":")
            .unwrap();
        assert!(f.manager.restore().is_none());
        assert!(f.session.is_empty());
    }

    #[test]
    fn nothing_stored_is_not_counted() {
        let f = fixture();
        assert!(f.manager.restore().is_none());
        assert_eq!(f.manager.stats().attempts(), 0);
        assert!(f.manager.is_healthy());
    }

    #[test]
    fn write_failure_is_swallowed() {
        let session = MemoryStore::with_capacity(4);
        let durable = Arc::new(MemoryStore::new());
        let manager = RecoveryManager::new(
            Box::new(session),
            Box::new(Arc::clone(&durable)),
            "tab-a",
            Arc::new(ManualTime::starting_now()),
        );
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        assert!(!manager.save(&snap));
        // The durable tier still took the write.
        assert_eq!(manager.restore().unwrap().tier, RecoveryTier::Durable);
    }

    #[test]
    fn foreground_flag_is_stamped() {
        let mut f = fixture();
        f.manager.set_foreground(false);
        f.manager
            .save(&TimerSnapshot::initial(&TimerSettings::default()));
        let raw = f.durable.read(DURABLE_KEY).unwrap().unwrap();
        let entry = PersistedSnapshot::decode(&raw).unwrap();
        assert!(!entry.was_foreground);
        assert_eq!(entry.origin_id, "tab-a");
    }

    #[test]
    fn clear_removes_both_tiers() {
        let f = fixture();
        f.manager
            .save(&TimerSnapshot::initial(&TimerSettings::default()));
        f.manager.clear();
        assert!(f.manager.restore().is_none());
    }

    #[test]
    fn validate_uses_two_second_tolerance() {
        let f = fixture();
        assert!(f.manager.validate(100, 100));
        assert!(f.manager.validate(100, 98));
        assert!(f.manager.validate(98, 100));
        assert!(!f.manager.validate(100, 97));
    }

    #[test]
    fn health_degrades_with_failures() {
        let f = fixture();
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        f.manager.save(&snap);
        assert!(f.manager.restore().is_some());

        f.time.advance_secs(11 * 60);
        assert!(f.manager.restore().is_none());

        let stats = f.manager.stats();
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 1);
        assert!(!f.manager.is_healthy());

        f.manager.reset_stats();
        assert_eq!(f.manager.stats(), RecoveryStats::default());
    }

    #[test]
    fn running_without_start_time_uses_save_time() {
        let f = fixture();
        let mut snap = running(100, f.time.now());
        snap.last_start_time = None;
        f.manager.save(&snap);
        f.time.advance_secs(40);

        let outcome = f.manager.restore().unwrap();
        assert_eq!(outcome.snapshot.remaining, 60);
    }
}
