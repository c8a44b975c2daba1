//! Outcome feed and the monitor that turns new outcomes into cycles
//!
//! The feed is read-only from the engine's point of view; outcomes are
//! written by an upstream collector (`SqliteOutcomeFeed::insert_outcome`
//! exists for that side and for tests).

use super::db::FeedCursor;
use super::dispatcher::{CycleReport, Dispatcher};
use super::error::{CycleError, StoreError};
use super::types::Outcome;
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Source of observed outcomes
#[async_trait]
pub trait OutcomeFeed: Send + Sync {
    /// Most recent outcome, if any
    async fn latest(&self) -> Result<Option<Outcome>, StoreError>;

    /// Up to `limit` outcomes, newest first
    async fn get_history(&self, limit: usize) -> Result<Vec<Outcome>, StoreError>;
}

/// Newest first: draw time, then sequence id (wider ids are later)
const NEWEST_FIRST: &str = "ORDER BY open_time DESC, length(sequence_id) DESC, sequence_id DESC";

/// `OutcomeFeed` over the `outcomes` table
pub struct SqliteOutcomeFeed {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOutcomeFeed {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self::from_shared(Arc::new(Mutex::new(conn))))
    }

    /// Share a connection already opened by the store
    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Record an outcome; returns false if the sequence id already exists
    pub fn insert_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO outcomes (sequence_id, sum_value, draw, open_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![outcome.sequence_id, outcome.sum, outcome.draw, outcome.open_time],
        )?;
        Ok(inserted == 1)
    }
}

fn outcome_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Outcome> {
    Ok(Outcome {
        sequence_id: row.get(0)?,
        sum: row.get(1)?,
        draw: row.get(2)?,
        open_time: row.get(3)?,
    })
}

#[async_trait]
impl OutcomeFeed for SqliteOutcomeFeed {
    async fn latest(&self) -> Result<Option<Outcome>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT sequence_id, sum_value, draw, open_time FROM outcomes {} LIMIT 1",
            NEWEST_FIRST
        );

        Ok(conn.query_row(&sql, [], outcome_from_row).optional()?)
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<Outcome>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT sequence_id, sum_value, draw, open_time FROM outcomes {} LIMIT ?1",
            NEWEST_FIRST
        );

        let mut stmt = conn.prepare(&sql)?;
        let outcomes = stmt
            .query_map(params![limit as i64], outcome_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(outcomes)
    }
}

/// Polls the feed and runs one dispatcher cycle per new outcome
///
/// Cycles are awaited inline, so a slow cycle delays the next poll rather
/// than overlapping with it.
pub struct FeedMonitor {
    feed: Arc<dyn OutcomeFeed>,
    cursor: Arc<dyn FeedCursor>,
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
}

impl FeedMonitor {
    pub fn new(
        feed: Arc<dyn OutcomeFeed>,
        cursor: Arc<dyn FeedCursor>,
        dispatcher: Arc<Dispatcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            feed,
            cursor,
            dispatcher,
            poll_interval,
        }
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        log::info!("👀 Feed monitor started (interval: {:?})", self.poll_interval);

        let mut timer = interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.check_new().await {
                        log::warn!("⚠️  Feed check failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("🛑 Feed monitor stopped");
    }

    /// Run a cycle if the feed has moved past the persisted cursor
    ///
    /// The cursor is advanced before the cycle runs, so an outcome whose
    /// cycle fails is not retried.
    pub async fn check_new(&self) -> Result<Option<CycleReport>, CycleError> {
        let Some(latest) = self.feed.latest().await? else {
            return Ok(None);
        };
        if latest.sequence_id.is_empty() {
            return Ok(None);
        }

        let last_seen = self.cursor.last_seen_sequence().await?;
        if last_seen.as_deref() == Some(latest.sequence_id.as_str()) {
            return Ok(None);
        }

        self.cursor
            .set_last_seen_sequence(&latest.sequence_id, chrono::Utc::now().timestamp())
            .await?;

        log::info!(
            "🎲 New outcome {} (sum {}, previous {})",
            latest.sequence_id,
            latest.sum,
            last_seen.as_deref().unwrap_or("none")
        );

        let report = self.dispatcher.run_cycle(&latest).await?;
        Ok(Some(report))
    }
}
