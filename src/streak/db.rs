//! Store traits and the SQLite implementation
//!
//! Tables (see `/sql/`):
//! - `subscribers`   - who receives alerts, enabled flag
//! - `streak_rules`  - UNIQUE (subscriber, pattern, attribute) thresholds
//! - `streak_alerts` - streak records; ended rows are retained as history
//! - `feed_state`    - single-row cursor of the last processed outcome
//!
//! The engine only reads rules and subscribers. The administrative
//! operations at the bottom of `SqliteStore` are what a chat UI or admin
//! tool calls to edit them.

use super::error::StoreError;
use super::rules::{adjusted_threshold, DEFAULT_RULES};
use super::types::{AttributeType, PatternType, Rule, Streak, StreakStatus, StreakUpdate};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Schema files compiled into the binary, applied by `init_schema()`
const EMBEDDED_SCHEMA: [(&str, &str); 5] = [
    ("01_subscribers.sql", include_str!("../../sql/01_subscribers.sql")),
    ("02_streak_rules.sql", include_str!("../../sql/02_streak_rules.sql")),
    ("03_streak_alerts.sql", include_str!("../../sql/03_streak_alerts.sql")),
    ("04_outcomes.sql", include_str!("../../sql/04_outcomes.sql")),
    ("05_feed_state.sql", include_str!("../../sql/05_feed_state.sql")),
];

const STREAK_COLUMNS: &str = "id, subscriber_id, pattern_type, attribute_type, status, \
     start_sequence, current_sequence, count, detail_json, last_alert_count, \
     created_at, updated_at";

/// Subscriber configuration consumed by the rule filter
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Subscribers with alerts enabled
    async fn get_active_subscribers(&self) -> Result<Vec<i64>, StoreError>;

    /// Enabled rules for one subscriber
    async fn get_enabled_rules(&self, subscriber_id: i64) -> Result<Vec<Rule>, StoreError>;
}

/// Streak records read and written by the tracker
///
/// Callers serialize access per (subscriber, pattern, attribute) key; the
/// store itself only guarantees each call is atomic.
#[async_trait]
pub trait StreakStore: Send + Sync {
    /// The active record for a key, if any
    async fn find_active(
        &self,
        subscriber_id: i64,
        pattern_type: PatternType,
        attribute_type: AttributeType,
    ) -> Result<Option<Streak>, StoreError>;

    /// Insert a record and return its id
    async fn insert(&self, streak: Streak) -> Result<i64, StoreError>;

    /// Rewrite the continuing fields of a record in place
    async fn update(&self, streak_id: i64, update: StreakUpdate) -> Result<(), StoreError>;

    async fn mark_ended(&self, streak_id: i64) -> Result<(), StoreError>;

    /// All active records for a subscriber
    async fn list_active(&self, subscriber_id: i64) -> Result<Vec<Streak>, StoreError>;
}

/// Persisted position of the feed monitor
#[async_trait]
pub trait FeedCursor: Send + Sync {
    async fn last_seen_sequence(&self) -> Result<Option<String>, StoreError>;

    async fn set_last_seen_sequence(&self, sequence_id: &str, now: i64) -> Result<(), StoreError>;
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir`, sorted by name (00_, 01_, ...),
/// and executes them. Every file must be idempotent (IF NOT EXISTS).
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(format!("Schema directory not found: {}", schema_dir).into());
    }

    apply_optimized_pragmas(conn)?;

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}

/// Apply the embedded copy of the schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    for (name, sql) in EMBEDDED_SCHEMA {
        log::debug!("   ├─ Applying embedded schema: {}", name);
        conn.execute_batch(sql)?;
    }
    Ok(())
}

/// Aggregate counters for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub subscribers: i64,
    pub enabled_subscribers: i64,
    pub enabled_rules: i64,
    pub active_streaks: i64,
}

/// SQLite-backed `ConfigStore`, `StreakStore` and `FeedCursor`
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    ///
    /// Does NOT create the schema; call `init_schema()` or
    /// `run_schema_migrations()` first.
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Connection handle for other components sharing this database file
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        init_schema(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Register a subscriber with the default rule set
    ///
    /// Returns true if the subscriber was created, false if it already
    /// existed (its rules are left untouched).
    pub fn ensure_subscriber(&self, subscriber_id: i64) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let created = tx.execute(
            "INSERT OR IGNORE INTO subscribers (subscriber_id, enabled, created_at, updated_at)
             VALUES (?1, 1, ?2, ?2)",
            params![subscriber_id, now],
        )? == 1;

        if created {
            for (pattern_type, attribute_type, threshold) in DEFAULT_RULES {
                tx.execute(
                    "INSERT OR IGNORE INTO streak_rules
                        (subscriber_id, pattern_type, attribute_type, threshold, enabled, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
                    params![
                        subscriber_id,
                        pattern_type.as_str(),
                        attribute_type.as_str(),
                        threshold,
                        now
                    ],
                )?;
            }
        }

        tx.commit()?;

        if created {
            log::info!("👥 Registered subscriber {} with default rules", subscriber_id);
        }

        Ok(created)
    }

    /// Returns false if the subscriber does not exist
    pub fn set_subscriber_enabled(&self, subscriber_id: i64, enabled: bool) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE subscribers SET enabled = ?1, updated_at = ?2 WHERE subscriber_id = ?3",
            params![enabled, chrono::Utc::now().timestamp(), subscriber_id],
        )?;
        Ok(changed == 1)
    }

    pub fn upsert_rule(
        &self,
        subscriber_id: i64,
        pattern_type: PatternType,
        attribute_type: AttributeType,
        threshold: u32,
        enabled: bool,
    ) -> Result<(), StoreError> {
        // Combo patterns only run over size+parity, the rest never do
        if pattern_type.is_combo() != (attribute_type == AttributeType::SizeParity) {
            return Err(StoreError::InvalidValue(format!(
                "rule {}/{} can never match",
                pattern_type.as_str(),
                attribute_type.as_str()
            )));
        }

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO streak_rules
                (subscriber_id, pattern_type, attribute_type, threshold, enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(subscriber_id, pattern_type, attribute_type) DO UPDATE SET
                threshold = excluded.threshold,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
            params![
                subscriber_id,
                pattern_type.as_str(),
                attribute_type.as_str(),
                threshold,
                enabled,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Flip a rule's enabled flag; returns the new value, None if no such rule
    pub fn toggle_rule(
        &self,
        subscriber_id: i64,
        pattern_type: PatternType,
        attribute_type: AttributeType,
    ) -> Result<Option<bool>, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE streak_rules SET enabled = NOT enabled, updated_at = ?1
             WHERE subscriber_id = ?2 AND pattern_type = ?3 AND attribute_type = ?4",
            params![
                chrono::Utc::now().timestamp(),
                subscriber_id,
                pattern_type.as_str(),
                attribute_type.as_str()
            ],
        )?;

        let enabled = conn
            .query_row(
                "SELECT enabled FROM streak_rules
                 WHERE subscriber_id = ?1 AND pattern_type = ?2 AND attribute_type = ?3",
                params![subscriber_id, pattern_type.as_str(), attribute_type.as_str()],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;

        Ok(enabled)
    }

    /// Move a threshold by `steps` increments (negative lowers it)
    ///
    /// Grouped-repeat moves one whole group per step. The result is clamped
    /// to the pattern's bounds. Returns the new threshold, None if no such rule.
    pub fn adjust_threshold(
        &self,
        subscriber_id: i64,
        pattern_type: PatternType,
        attribute_type: AttributeType,
        steps: i32,
    ) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;

        let current = conn
            .query_row(
                "SELECT threshold FROM streak_rules
                 WHERE subscriber_id = ?1 AND pattern_type = ?2 AND attribute_type = ?3",
                params![subscriber_id, pattern_type.as_str(), attribute_type.as_str()],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Ok(None);
        };

        let next = adjusted_threshold(pattern_type, current, steps);
        conn.execute(
            "UPDATE streak_rules SET threshold = ?1, updated_at = ?2
             WHERE subscriber_id = ?3 AND pattern_type = ?4 AND attribute_type = ?5",
            params![
                next,
                chrono::Utc::now().timestamp(),
                subscriber_id,
                pattern_type.as_str(),
                attribute_type.as_str()
            ],
        )?;

        Ok(Some(next))
    }

    /// Every rule of a subscriber, enabled or not
    pub fn list_rules(&self, subscriber_id: i64) -> Result<Vec<Rule>, StoreError> {
        let conn = self.lock()?;
        query_rules(&conn, subscriber_id, false)
    }

    /// Every streak record of a subscriber, ended ones included, oldest first
    pub fn list_streaks(&self, subscriber_id: i64) -> Result<Vec<Streak>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM streak_alerts WHERE subscriber_id = ?1 ORDER BY id",
            STREAK_COLUMNS
        );
        query_streaks(&conn, &sql, subscriber_id)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;
        let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));

        Ok(StoreStats {
            subscribers: count("SELECT COUNT(*) FROM subscribers")?,
            enabled_subscribers: count("SELECT COUNT(*) FROM subscribers WHERE enabled = 1")?,
            enabled_rules: count("SELECT COUNT(*) FROM streak_rules WHERE enabled = 1")?,
            active_streaks: count("SELECT COUNT(*) FROM streak_alerts WHERE status = 'active'")?,
        })
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn get_active_subscribers(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT subscriber_id FROM subscribers WHERE enabled = 1 ORDER BY subscriber_id",
        )?;

        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    async fn get_enabled_rules(&self, subscriber_id: i64) -> Result<Vec<Rule>, StoreError> {
        let conn = self.lock()?;
        query_rules(&conn, subscriber_id, true)
    }
}

#[async_trait]
impl StreakStore for SqliteStore {
    async fn find_active(
        &self,
        subscriber_id: i64,
        pattern_type: PatternType,
        attribute_type: AttributeType,
    ) -> Result<Option<Streak>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM streak_alerts
             WHERE subscriber_id = ?1 AND pattern_type = ?2 AND attribute_type = ?3 AND status = 'active'
             ORDER BY id DESC LIMIT 1",
            STREAK_COLUMNS
        );

        let row = conn
            .query_row(
                &sql,
                params![subscriber_id, pattern_type.as_str(), attribute_type.as_str()],
                StreakRow::from_row,
            )
            .optional()?;

        row.map(StreakRow::into_streak).transpose()
    }

    async fn insert(&self, streak: Streak) -> Result<i64, StoreError> {
        let detail_json = serde_json::to_string(&streak.detail)?;
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO streak_alerts (
                subscriber_id, pattern_type, attribute_type, status,
                start_sequence, current_sequence, count, detail_json,
                last_alert_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                streak.subscriber_id,
                streak.pattern_type.as_str(),
                streak.attribute_type.as_str(),
                streak.status.as_str(),
                streak.start_sequence,
                streak.current_sequence,
                streak.count,
                detail_json,
                streak.last_alert_count,
                streak.created_at,
                streak.updated_at,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn update(&self, streak_id: i64, update: StreakUpdate) -> Result<(), StoreError> {
        let detail_json = serde_json::to_string(&update.detail)?;
        let conn = self.lock()?;

        let changed = conn.execute(
            r#"
            UPDATE streak_alerts
            SET current_sequence = ?1, count = ?2, detail_json = ?3,
                last_alert_count = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
            params![
                update.current_sequence,
                update.count,
                detail_json,
                update.last_alert_count,
                update.updated_at,
                streak_id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::InvalidValue(format!("streak {} not found", streak_id)));
        }
        Ok(())
    }

    async fn mark_ended(&self, streak_id: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE streak_alerts SET status = 'ended', updated_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().timestamp(), streak_id],
        )?;
        Ok(())
    }

    async fn list_active(&self, subscriber_id: i64) -> Result<Vec<Streak>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM streak_alerts WHERE subscriber_id = ?1 AND status = 'active' ORDER BY id",
            STREAK_COLUMNS
        );
        query_streaks(&conn, &sql, subscriber_id)
    }
}

#[async_trait]
impl FeedCursor for SqliteStore {
    async fn last_seen_sequence(&self) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let last = conn
            .query_row("SELECT last_sequence FROM feed_state WHERE id = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;

        Ok(last.filter(|s| !s.is_empty()))
    }

    async fn set_last_seen_sequence(&self, sequence_id: &str, now: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feed_state (id, last_sequence, last_check_time) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                last_sequence = excluded.last_sequence,
                last_check_time = excluded.last_check_time",
            params![sequence_id, now],
        )?;
        Ok(())
    }
}

/// Rules for a subscriber; rows with unknown codes are skipped
fn query_rules(conn: &Connection, subscriber_id: i64, enabled_only: bool) -> Result<Vec<Rule>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, subscriber_id, pattern_type, attribute_type, threshold, enabled
         FROM streak_rules
         WHERE subscriber_id = ?1 AND (?2 = 0 OR enabled = 1)
         ORDER BY attribute_type, pattern_type",
    )?;

    let rows = stmt.query_map(params![subscriber_id, enabled_only], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, u32>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut rules = Vec::new();
    for row in rows {
        let (id, subscriber_id, pattern, attribute, threshold, enabled) = row?;

        match (PatternType::from_str(&pattern), AttributeType::from_str(&attribute)) {
            (Some(pattern_type), Some(attribute_type)) => rules.push(Rule {
                id,
                subscriber_id,
                pattern_type,
                attribute_type,
                threshold,
                enabled,
            }),
            _ => log::warn!(
                "⚠️  Skipping rule {} with unknown key ({}, {})",
                id,
                pattern,
                attribute
            ),
        }
    }

    Ok(rules)
}

fn query_streaks(conn: &Connection, sql: &str, subscriber_id: i64) -> Result<Vec<Streak>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![subscriber_id], StreakRow::from_row)?;

    let mut streaks = Vec::new();
    for row in rows {
        streaks.push(row?.into_streak()?);
    }
    Ok(streaks)
}

/// Raw `streak_alerts` row before enum codes are parsed
struct StreakRow {
    id: i64,
    subscriber_id: i64,
    pattern_type: String,
    attribute_type: String,
    status: String,
    start_sequence: String,
    current_sequence: String,
    count: u32,
    detail_json: String,
    last_alert_count: u32,
    created_at: i64,
    updated_at: i64,
}

impl StreakRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subscriber_id: row.get(1)?,
            pattern_type: row.get(2)?,
            attribute_type: row.get(3)?,
            status: row.get(4)?,
            start_sequence: row.get(5)?,
            current_sequence: row.get(6)?,
            count: row.get(7)?,
            detail_json: row.get(8)?,
            last_alert_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_streak(self) -> Result<Streak, StoreError> {
        let pattern_type = PatternType::from_str(&self.pattern_type)
            .ok_or_else(|| StoreError::InvalidValue(format!("pattern_type '{}'", self.pattern_type)))?;
        let attribute_type = AttributeType::from_str(&self.attribute_type).ok_or_else(|| {
            StoreError::InvalidValue(format!("attribute_type '{}'", self.attribute_type))
        })?;
        let status = StreakStatus::from_str(&self.status)
            .ok_or_else(|| StoreError::InvalidValue(format!("status '{}'", self.status)))?;

        Ok(Streak {
            id: self.id,
            subscriber_id: self.subscriber_id,
            pattern_type,
            attribute_type,
            status,
            start_sequence: self.start_sequence,
            current_sequence: self.current_sequence,
            count: self.count,
            detail: serde_json::from_str(&self.detail_json)?,
            last_alert_count: self.last_alert_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    /// Helper to create a test database with schema
    fn create_test_store() -> (NamedTempFile, SqliteStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteStore::new(temp_file.path().to_str().unwrap()).unwrap();
        store.init_schema().unwrap();
        (temp_file, store)
    }

    fn make_streak(subscriber_id: i64, start: &str, count: u32) -> Streak {
        Streak {
            id: 0,
            subscriber_id,
            pattern_type: PatternType::Repeat,
            attribute_type: AttributeType::Size,
            status: StreakStatus::Active,
            start_sequence: start.to_string(),
            current_sequence: start.to_string(),
            count,
            detail: vec!["small".to_string(); count as usize],
            last_alert_count: count,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_ensure_subscriber_seeds_default_rules_once() {
        let (_temp, store) = create_test_store();

        assert!(store.ensure_subscriber(-1001).unwrap());
        assert_eq!(store.list_rules(-1001).unwrap().len(), DEFAULT_RULES.len());

        // Customized threshold survives a second ensure
        store
            .upsert_rule(-1001, PatternType::Repeat, AttributeType::Size, 9, true)
            .unwrap();
        assert!(!store.ensure_subscriber(-1001).unwrap());

        let rules = store.list_rules(-1001).unwrap();
        assert_eq!(rules.len(), DEFAULT_RULES.len());
        let repeat_size = rules
            .iter()
            .find(|r| r.pattern_type == PatternType::Repeat && r.attribute_type == AttributeType::Size)
            .unwrap();
        assert_eq!(repeat_size.threshold, 9);
    }

    #[test]
    fn test_upsert_rule_rejects_unmatchable_pairs() {
        let (_temp, store) = create_test_store();

        assert!(store
            .upsert_rule(-1001, PatternType::ComboRepeat, AttributeType::Size, 3, true)
            .is_err());
        assert!(store
            .upsert_rule(-1001, PatternType::Repeat, AttributeType::SizeParity, 3, true)
            .is_err());
        assert!(store.list_rules(-1001).unwrap().is_empty());

        store
            .upsert_rule(-1001, PatternType::ComboRepeat, AttributeType::SizeParity, 4, true)
            .unwrap();
        assert_eq!(store.list_rules(-1001).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enabled_rules_and_subscribers() {
        let (_temp, store) = create_test_store();
        store.ensure_subscriber(-1001).unwrap();
        store.ensure_subscriber(-1002).unwrap();

        assert_eq!(
            store.toggle_rule(-1001, PatternType::ComboRepeat, AttributeType::SizeParity).unwrap(),
            Some(false)
        );
        let enabled = store.get_enabled_rules(-1001).await.unwrap();
        assert_eq!(enabled.len(), DEFAULT_RULES.len() - 1);
        assert!(enabled.iter().all(|r| r.enabled));

        assert!(store.set_subscriber_enabled(-1002, false).unwrap());
        assert_eq!(store.get_active_subscribers().await.unwrap(), vec![-1001]);

        assert!(!store.set_subscriber_enabled(-9999, false).unwrap());
    }

    #[test]
    fn test_adjust_threshold() {
        let (_temp, store) = create_test_store();
        store.ensure_subscriber(-1001).unwrap();

        let next = store
            .adjust_threshold(-1001, PatternType::GroupedRepeat, AttributeType::Sum, 2)
            .unwrap();
        assert_eq!(next, Some(9));

        let floor = store
            .adjust_threshold(-1001, PatternType::Alternate, AttributeType::Size, -5)
            .unwrap();
        assert_eq!(floor, Some(2));

        let missing = store
            .adjust_threshold(-4242, PatternType::Repeat, AttributeType::Size, 1)
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_insert_find_update_streak() {
        let (_temp, store) = create_test_store();

        let id = store.insert(make_streak(-1001, "1000", 2)).await.unwrap();

        let found = store
            .find_active(-1001, PatternType::Repeat, AttributeType::Size)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.detail, vec!["small".to_string(), "small".to_string()]);

        store
            .update(
                id,
                StreakUpdate {
                    current_sequence: "1002".to_string(),
                    count: 3,
                    detail: vec!["small".to_string(); 3],
                    last_alert_count: 3,
                    updated_at: 1_700_000_100,
                },
            )
            .await
            .unwrap();

        let updated = store
            .find_active(-1001, PatternType::Repeat, AttributeType::Size)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.current_sequence, "1002");
        assert_eq!(updated.count, 3);
        assert_eq!(updated.start_sequence, "1000");
    }

    #[tokio::test]
    async fn test_update_missing_streak_fails() {
        let (_temp, store) = create_test_store();

        let result = store
            .update(
                77,
                StreakUpdate {
                    current_sequence: "1".to_string(),
                    count: 1,
                    detail: Vec::new(),
                    last_alert_count: 1,
                    updated_at: 0,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mark_ended_keeps_history() {
        let (_temp, store) = create_test_store();
        let id = store.insert(make_streak(-1001, "1000", 2)).await.unwrap();

        store.mark_ended(id).await.unwrap();

        assert!(store.list_active(-1001).await.unwrap().is_empty());
        let history = store.list_streaks(-1001).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, StreakStatus::Ended);
    }

    #[tokio::test]
    async fn test_second_active_streak_for_key_rejected() {
        let (_temp, store) = create_test_store();
        store.insert(make_streak(-1001, "1000", 2)).await.unwrap();

        let duplicate = store.insert(make_streak(-1001, "1005", 2)).await;
        assert!(duplicate.is_err());

        // Other subscribers are independent
        store.insert(make_streak(-1002, "1005", 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_status_is_invalid_value() {
        let (_temp, store) = create_test_store();
        store.insert(make_streak(-1001, "1000", 2)).await.unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute("UPDATE streak_alerts SET status = 'paused'", []).unwrap();
        }

        let err = store.list_streaks(-1001).unwrap_err();
        assert!(err.to_string().contains("paused"));
    }

    #[tokio::test]
    async fn test_stats() {
        let (_temp, store) = create_test_store();
        store.ensure_subscriber(-1001).unwrap();
        store.ensure_subscriber(-1002).unwrap();
        store.set_subscriber_enabled(-1002, false).unwrap();
        store.insert(make_streak(-1001, "1000", 2)).await.unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.enabled_subscribers, 1);
        assert_eq!(stats.enabled_rules, 2 * DEFAULT_RULES.len() as i64);
        assert_eq!(stats.active_streaks, 1);
    }

    #[tokio::test]
    async fn test_feed_cursor() {
        let (_temp, store) = create_test_store();

        assert_eq!(store.last_seen_sequence().await.unwrap(), None);

        store.set_last_seen_sequence("3312345", 1_700_000_000).await.unwrap();
        assert_eq!(
            store.last_seen_sequence().await.unwrap(),
            Some("3312345".to_string())
        );
    }

    #[test]
    fn test_run_schema_migrations_from_directory() {
        let temp = NamedTempFile::new().unwrap();
        let mut conn = Connection::open(temp.path()).unwrap();

        let schema_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");
        run_schema_migrations(&mut conn, schema_dir).unwrap();
        // Idempotent
        run_schema_migrations(&mut conn, schema_dir).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('subscribers', 'streak_rules', 'streak_alerts', 'outcomes', 'feed_state')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn test_missing_schema_dir() {
        let temp = NamedTempFile::new().unwrap();
        let mut conn = Connection::open(temp.path()).unwrap();

        assert!(run_schema_migrations(&mut conn, "/nonexistent/schema").is_err());
    }
}
