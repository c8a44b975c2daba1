//! Runtime configuration from environment variables

use super::analyzer::DEFAULT_HISTORY_WINDOW;
use std::env;
use std::time::Duration;

/// Smallest window in which any pattern can match (grouped repeat needs 3)
const MIN_HISTORY_WINDOW: usize = 3;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the streak runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct StreakConfig {
    /// Read-write store (subscribers, rules, streaks, cursor)
    pub db_path: String,

    /// Database holding the `outcomes` table
    pub feed_db_path: String,

    /// Directory of idempotent `.sql` migrations
    pub schema_dir: String,

    pub poll_interval_ms: u64,

    /// Outcomes fetched per analysis cycle
    pub history_window: usize,

    /// Alerts go to the log when unset
    pub telegram_bot_token: Option<String>,

    pub notify_timeout_secs: u64,

    /// Skip private chats (positive subscriber ids)
    pub groups_only: bool,

    /// Registered with the default rule set at startup
    pub seed_subscribers: Vec<i64>,

    /// Master switch for the feed monitor
    pub monitor_enabled: bool,
}

impl StreakConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `STREAK_DB_PATH` (default: /var/lib/streakwatch/streakwatch.db)
    /// - `STREAK_FEED_DB_PATH` (default: same as STREAK_DB_PATH)
    /// - `STREAK_SCHEMA_DIR` (default: sql)
    /// - `POLL_INTERVAL_MS` (default: 1000)
    /// - `HISTORY_WINDOW` (default: 500)
    /// - `TELEGRAM_BOT_TOKEN` (optional)
    /// - `NOTIFY_TIMEOUT_SECS` (default: 10)
    /// - `GROUPS_ONLY` (default: true)
    /// - `STREAK_SEED_SUBSCRIBERS` (comma-separated ids, default: none)
    /// - `ENABLE_MONITOR` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = env::var("STREAK_DB_PATH")
            .unwrap_or_else(|_| "/var/lib/streakwatch/streakwatch.db".to_string());

        let feed_db_path = env::var("STREAK_FEED_DB_PATH").unwrap_or_else(|_| db_path.clone());

        let seed_subscribers = match env::var("STREAK_SEED_SUBSCRIBERS") {
            Ok(list) => parse_subscriber_list(&list)?,
            Err(_) => Vec::new(),
        };

        let config = Self {
            db_path,
            feed_db_path,

            schema_dir: env::var("STREAK_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            history_window: env::var("HISTORY_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HISTORY_WINDOW),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),

            notify_timeout_secs: env::var("NOTIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            groups_only: env::var("GROUPS_ONLY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),

            seed_subscribers,

            monitor_enabled: env::var("ENABLE_MONITOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }

        if self.history_window < MIN_HISTORY_WINDOW {
            return Err(ConfigError::InvalidValue(format!(
                "HISTORY_WINDOW must be at least {}, got {}",
                MIN_HISTORY_WINDOW, self.history_window
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

/// Parse "-1001, -1002" into ids; blank entries are ignored
fn parse_subscriber_list(list: &str) -> Result<Vec<i64>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(format!("STREAK_SEED_SUBSCRIBERS entry '{}' is not an id", s))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 10] = [
        "STREAK_DB_PATH",
        "STREAK_FEED_DB_PATH",
        "STREAK_SCHEMA_DIR",
        "POLL_INTERVAL_MS",
        "HISTORY_WINDOW",
        "TELEGRAM_BOT_TOKEN",
        "NOTIFY_TIMEOUT_SECS",
        "GROUPS_ONLY",
        "STREAK_SEED_SUBSCRIBERS",
        "ENABLE_MONITOR",
    ];

    fn base_config() -> StreakConfig {
        StreakConfig {
            db_path: "/tmp/streak.db".to_string(),
            feed_db_path: "/tmp/streak.db".to_string(),
            schema_dir: "sql".to_string(),
            poll_interval_ms: 1_000,
            history_window: 500,
            telegram_bot_token: None,
            notify_timeout_secs: 10,
            groups_only: true,
            seed_subscribers: Vec::new(),
            monitor_enabled: true,
        }
    }

    #[test]
    fn test_env_config() {
        // Defaults and overrides run in one test; the environment is process-wide
        for var in VARS {
            env::remove_var(var);
        }

        let config = StreakConfig::from_env().unwrap();

        assert_eq!(config.db_path, "/var/lib/streakwatch/streakwatch.db");
        assert_eq!(config.feed_db_path, config.db_path);
        assert_eq!(config.schema_dir, "sql");
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.history_window, 500);
        assert_eq!(config.telegram_bot_token, None);
        assert_eq!(config.notify_timeout_secs, 10);
        assert!(config.groups_only);
        assert!(config.seed_subscribers.is_empty());
        assert!(config.monitor_enabled);

        env::set_var("STREAK_DB_PATH", "/tmp/test.db");
        env::set_var("STREAK_FEED_DB_PATH", "/tmp/feed.db");
        env::set_var("POLL_INTERVAL_MS", "250");
        env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");
        env::set_var("GROUPS_ONLY", "false");
        env::set_var("STREAK_SEED_SUBSCRIBERS", "-1001, -1002,");

        let config = StreakConfig::from_env().unwrap();

        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.feed_db_path, "/tmp/feed.db");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));
        assert!(!config.groups_only);
        assert_eq!(config.seed_subscribers, vec![-1001, -1002]);

        env::set_var("HISTORY_WINDOW", "2");
        assert!(StreakConfig::from_env().is_err());

        // Cleanup
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = base_config();
        config.poll_interval_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_window_bounds() {
        let mut config = base_config();
        config.history_window = 3;
        assert!(config.validate().is_ok());

        config.history_window = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("HISTORY_WINDOW"));
    }

    #[test]
    fn test_parse_subscriber_list() {
        assert_eq!(parse_subscriber_list("").unwrap(), Vec::<i64>::new());
        assert_eq!(parse_subscriber_list("-1001,42").unwrap(), vec![-1001, 42]);
        assert!(parse_subscriber_list("-1001,group").is_err());
    }
}
