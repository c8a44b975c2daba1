//! Streak tracker - per-subscriber streak lifecycle
//!
//! ## State machine (per subscriber, pattern, attribute)
//!
//! ```text
//! none ──track──▶ active(start=S)            alert, new
//! active(S) ──track(start=S)──▶ active(S)    alert, continued
//! active(S) ──track(start=T≠S)──▶ ended(S) + active(T)   alert, new
//! active(S) ──end_inactive (S absent)──▶ ended(S)
//! ```
//!
//! Read-then-write sequences hold an async lock for their key, so two
//! tasks can never both observe "no active record" and insert twice.

use super::db::StreakStore;
use super::error::StoreError;
use super::types::{AttributeType, PatternResult, PatternType, Streak, StreakUpdate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type StreakKey = (i64, PatternType, AttributeType);

/// Outcome of tracking one pattern result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackDecision {
    pub should_alert: bool,
    /// True when a new streak record was created
    pub is_new: bool,
}

impl TrackDecision {
    fn started() -> Self {
        Self {
            should_alert: true,
            is_new: true,
        }
    }

    fn continued() -> Self {
        Self {
            should_alert: true,
            is_new: false,
        }
    }

    fn skipped() -> Self {
        Self {
            should_alert: false,
            is_new: false,
        }
    }
}

pub struct StreakTracker {
    store: Arc<dyn StreakStore>,
    locks: Mutex<HashMap<StreakKey, Arc<tokio::sync::Mutex<()>>>>,
    /// Timestamp function (for testing with mock time)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl StreakTracker {
    pub fn new(store: Arc<dyn StreakStore>) -> Self {
        Self::new_with_timestamp_fn(store, Box::new(|| chrono::Utc::now().timestamp()))
    }

    pub fn new_with_timestamp_fn(
        store: Arc<dyn StreakStore>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            now_fn,
        }
    }

    fn key_lock(&self, key: StreakKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key).or_default().clone()
    }

    /// Record a matched result and decide whether to alert
    ///
    /// Store failures are logged and yield `should_alert = false`; they never
    /// propagate to the caller.
    pub async fn track(&self, subscriber_id: i64, result: &PatternResult) -> TrackDecision {
        let lock = self.key_lock((subscriber_id, result.pattern_type, result.attribute_type));
        let _guard = lock.lock().await;

        match self.apply(subscriber_id, result).await {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!(
                    "⚠️  Tracking failed for subscriber {} ({} {}): {}",
                    subscriber_id,
                    result.pattern_type.as_str(),
                    result.attribute_type.as_str(),
                    e
                );
                TrackDecision::skipped()
            }
        }
    }

    async fn apply(&self, subscriber_id: i64, result: &PatternResult) -> Result<TrackDecision, StoreError> {
        let now = (self.now_fn)();
        let existing = self
            .store
            .find_active(subscriber_id, result.pattern_type, result.attribute_type)
            .await?;

        match existing {
            None => {
                let id = self
                    .store
                    .insert(Streak::from_result(subscriber_id, result, now))
                    .await?;
                log::debug!(
                    "🆕 Streak {} started: subscriber={} {} {} count={}",
                    id,
                    subscriber_id,
                    result.pattern_type.as_str(),
                    result.attribute_type.as_str(),
                    result.count
                );
                Ok(TrackDecision::started())
            }
            Some(active) if active.start_sequence == result.start_sequence => {
                self.store
                    .update(active.id, StreakUpdate::from_result(result, now))
                    .await?;
                log::debug!(
                    "📈 Streak {} continued: count {} → {}",
                    active.id,
                    active.count,
                    result.count
                );
                Ok(TrackDecision::continued())
            }
            Some(active) => {
                // A failed end leaves the old record active; inserting now
                // would create a second active record for the key.
                self.store.mark_ended(active.id).await?;
                let id = self
                    .store
                    .insert(Streak::from_result(subscriber_id, result, now))
                    .await?;
                log::debug!(
                    "🔁 Streak {} superseded by {} (start {} → {})",
                    active.id,
                    id,
                    active.start_sequence,
                    result.start_sequence
                );
                Ok(TrackDecision::started())
            }
        }
    }

    /// End every active streak of a subscriber that is no longer observed
    ///
    /// `current_results` is the full analyzer output for the cycle. Returns
    /// the number of records ended; failures are logged per record.
    pub async fn end_inactive(&self, subscriber_id: i64, current_results: &[PatternResult]) -> usize {
        let active = match self.store.list_active(subscriber_id).await {
            Ok(active) => active,
            Err(e) => {
                log::warn!(
                    "⚠️  Failed to list active streaks for subscriber {}: {}",
                    subscriber_id,
                    e
                );
                return 0;
            }
        };

        let mut ended = 0;
        for streak in active {
            let still_observed = current_results.iter().any(|result| {
                result.streak_key()
                    == (
                        streak.pattern_type,
                        streak.attribute_type,
                        streak.start_sequence.as_str(),
                    )
            });
            if still_observed {
                continue;
            }

            let lock = self.key_lock((subscriber_id, streak.pattern_type, streak.attribute_type));
            let _guard = lock.lock().await;

            match self.store.mark_ended(streak.id).await {
                Ok(()) => {
                    ended += 1;
                    log::debug!(
                        "🏁 Streak {} ended: subscriber={} {} {} at count {}",
                        streak.id,
                        subscriber_id,
                        streak.pattern_type.as_str(),
                        streak.attribute_type.as_str(),
                        streak.count
                    );
                }
                Err(e) => log::warn!("⚠️  Failed to end streak {}: {}", streak.id, e),
            }
        }

        ended
    }
}
