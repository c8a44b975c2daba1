//! Streak Runtime - feed monitor, streak tracking and alert delivery
//!
//! This binary:
//! - Initializes the SQLite database with schema
//! - Registers seed subscribers with the default rule set
//! - Builds analyzer, tracker, notifier and dispatcher
//! - Polls the outcome feed until CTRL+C
//!
//! Usage:
//!   cargo run --release --bin streak_runtime
//!
//! Environment variables:
//!   STREAK_DB_PATH - SQLite database path (default: /var/lib/streakwatch/streakwatch.db)
//!   STREAK_FEED_DB_PATH - Outcome feed database (default: STREAK_DB_PATH)
//!   TELEGRAM_BOT_TOKEN - Bot token; alerts are only logged when unset
//!   ENABLE_MONITOR - Master switch (default: true)
//!   POLL_INTERVAL_MS - Feed poll interval (default: 1000)

use dotenv::dotenv;
use log::{error, info};
use rusqlite::Connection;
use std::sync::Arc;
use streakwatch::streak::{
    analyzer::Analyzer,
    config::StreakConfig,
    db::{run_schema_migrations, SqliteStore},
    dispatcher::Dispatcher,
    feed::{FeedMonitor, OutcomeFeed, SqliteOutcomeFeed},
    notifier::{LogNotifier, Notifier, TelegramNotifier},
    tracker::StreakTracker,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Streak Runtime");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = StreakConfig::from_env()?;

    if !config.monitor_enabled {
        info!("⚠️  Monitor is DISABLED (set ENABLE_MONITOR=true to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    }

    info!("✅ Monitor ENABLED");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Feed database: {}", config.feed_db_path);
    info!("   ├─ Poll interval: {}ms", config.poll_interval_ms);
    info!("   ├─ History window: {} outcomes", config.history_window);
    info!("   ├─ Groups only: {}", config.groups_only);
    info!(
        "   └─ Delivery: {}",
        if config.telegram_bot_token.is_some() { "Telegram" } else { "log only" }
    );

    // Initialize database
    info!("🔧 Initializing database...");
    let mut conn = Connection::open(&config.db_path)?;

    // Run schema migrations (idempotent)
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    drop(conn); // Close temporary connection

    let store = Arc::new(SqliteStore::new(&config.db_path)?);
    info!("✅ Database initialized");

    for subscriber_id in &config.seed_subscribers {
        store.ensure_subscriber(*subscriber_id)?;
    }

    let stats = store.stats()?;
    info!("📊 Store Status:");
    info!(
        "   ├─ Subscribers: {} ({} enabled)",
        stats.subscribers, stats.enabled_subscribers
    );
    info!("   ├─ Enabled rules: {}", stats.enabled_rules);
    info!("   └─ Active streaks: {}", stats.active_streaks);

    // Outcome feed shares the store connection unless it lives elsewhere
    let feed: Arc<dyn OutcomeFeed> = if config.feed_db_path == config.db_path {
        Arc::new(SqliteOutcomeFeed::from_shared(store.shared_connection()))
    } else {
        Arc::new(SqliteOutcomeFeed::new(&config.feed_db_path)?)
    };

    let notifier: Arc<dyn Notifier> = match &config.telegram_bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(token, config.notify_timeout())?),
        None => Arc::new(LogNotifier),
    };

    let analyzer = Analyzer::new(feed.clone(), config.history_window);
    let tracker = Arc::new(StreakTracker::new(store.clone()));
    let dispatcher = Arc::new(
        Dispatcher::new(analyzer, store.clone(), tracker, notifier)
            .with_groups_only(config.groups_only),
    );
    info!("✅ Dispatcher created");

    let monitor = FeedMonitor::new(feed, store.clone(), dispatcher, config.poll_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor_handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
    });
    info!("   └─ ✅ Feed monitor spawned");

    info!("");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    // Wait for CTRL+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    // Signal shutdown; an in-flight cycle finishes first
    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_handle.await {
        error!("❌ Feed monitor task failed: {}", e);
    }

    info!("✅ Streak runtime stopped");
    Ok(())
}
