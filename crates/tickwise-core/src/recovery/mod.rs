//! Persistence and recovery for a running timer.
//!
//! A snapshot has to survive the process being restarted, suspended or
//! duplicated. Two tiers cover this:
//!
//! - a **session** tier private to one execution context (5 minute TTL), so a
//!   context that reloads picks up exactly where it left off;
//! - a **durable** tier shared by all contexts (10 minute TTL), so a newly
//!   opened context can adopt whatever was running most recently.
//!
//! Concurrent writers to the durable tier race and the last save wins. There
//! is no cross-context locking or leader election.

mod manager;
mod origin;
mod persisted;
mod stats;
mod store;

pub use manager::{
    correct_drift, DriftCorrection, RecoveryConfig, RecoveryManager, RecoveryTier, RestoreOutcome,
    SESSION_KEY_PREFIX,
};
pub use origin::{generate_origin_id, get_or_create_origin_id_at, is_valid_origin_id, OriginIdError};
pub use persisted::PersistedSnapshot;
pub use stats::RecoveryStats;
pub use store::{MemoryStore, SnapshotStore};
