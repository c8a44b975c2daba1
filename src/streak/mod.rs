//! # Streak Detection Engine
//!
//! Watches a feed of numeric outcomes, recognizes streak patterns over the
//! derived size / parity / sum attributes, and alerts each subscriber when
//! a streak meets one of its rules.
//!
//! ## Architecture
//!
//! ```text
//! outcomes table
//!     ↓
//! FeedMonitor (poll, cursor in feed_state)
//!     ↓
//! Dispatcher::run_cycle()
//!     ├─ Analyzer (attributes → six matchers → longest per attribute)
//!     └─ per subscriber: rules → StreakTracker → Notifier
//! ```
//!
//! ## Invariants
//!
//! - Matchers and the analyzer are pure; all I/O sits behind the store,
//!   feed and notifier traits.
//! - At most one active streak per (subscriber, pattern, attribute).
//! - Delivery failures never roll back a tracking decision.
//!
//! ## Schema Reference
//!
//! See `/sql/`:
//! - `subscribers`, `streak_rules` → `ConfigStore`
//! - `streak_alerts` → `StreakStore` (`Streak`)
//! - `outcomes` → `OutcomeFeed`
//! - `feed_state` → `FeedCursor`
//!
//! ## Module Organization
//!
//! - `types` - Outcomes, attributes, pattern results, rules, streaks
//! - `attributes` - Sum → size / parity derivation
//! - `patterns` - The six matchers
//! - `analyzer` - Window fetch, ordering check, longest-wins selection
//! - `rules` - Rule filter, default rule set, threshold adjustment
//! - `tracker` - Streak lifecycle with per-key locking
//! - `dispatcher` - One cycle across all subscribers
//! - `feed` - Outcome feed and polling monitor
//! - `notifier` - Alert rendering and delivery
//! - `db` - Store traits and SQLite implementation
//! - `config` - Environment configuration
//! - `error` - Error types

pub mod analyzer;
pub mod attributes;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod notifier;
pub mod patterns;
pub mod rules;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use analyzer::{analyze, Analyzer};
pub use config::{ConfigError, StreakConfig};
pub use db::{ConfigStore, FeedCursor, SqliteStore, StreakStore};
pub use dispatcher::{CycleReport, Dispatcher};
pub use error::{CycleError, HistoryError, NotifyError, StoreError};
pub use feed::{FeedMonitor, OutcomeFeed, SqliteOutcomeFeed};
pub use notifier::{LogNotifier, Notifier, TelegramNotifier};
pub use tracker::{StreakTracker, TrackDecision};
pub use types::{
    AttributeType, AttributeValue, Attributes, CurrentOutcome, Outcome, PatternResult,
    PatternType, Rule, Streak, StreakStatus,
};
