//! Integration tests for the full streak cycle
//!
//! Outcomes are written to the SQLite feed, the monitor picks them up, and
//! alerts land on a channel-backed notifier. Everything between runs on the
//! real stores:
//! - Schema migrations from `/sql/`
//! - Feed cursor advancing once per outcome
//! - Streak continuation, supersession and ending across cycles
//! - Per-subscriber isolation

#[cfg(test)]
mod streak_integration_tests {
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::Arc;
    use std::time::Duration;
    use streakwatch::streak::{
        db::run_schema_migrations, Analyzer, AttributeType, CurrentOutcome, Dispatcher,
        FeedMonitor, NotifyError, Notifier, Outcome, PatternResult, PatternType,
        SqliteOutcomeFeed, SqliteStore, StreakStatus, StreakStore, StreakTracker,
    };
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    type Alert = (i64, Vec<PatternResult>, CurrentOutcome);

    struct ChannelNotifier {
        tx: mpsc::UnboundedSender<Alert>,
    }

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(
            &self,
            subscriber_id: i64,
            results: &[PatternResult],
            current: &CurrentOutcome,
        ) -> Result<(), NotifyError> {
            let _ = self.tx.send((subscriber_id, results.to_vec(), current.clone()));
            Ok(())
        }
    }

    struct Harness {
        _temp: NamedTempFile,
        store: Arc<SqliteStore>,
        feed: Arc<SqliteOutcomeFeed>,
        monitor: FeedMonitor,
        alerts: mpsc::UnboundedReceiver<Alert>,
    }

    impl Harness {
        fn new(groups_only: bool) -> Self {
            let temp = NamedTempFile::new().unwrap();
            let db_path = temp.path().to_str().unwrap().to_string();

            let mut conn = Connection::open(&db_path).unwrap();
            run_schema_migrations(&mut conn, concat!(env!("CARGO_MANIFEST_DIR"), "/sql")).unwrap();
            drop(conn);

            let store = Arc::new(SqliteStore::new(&db_path).unwrap());
            let feed = Arc::new(SqliteOutcomeFeed::from_shared(store.shared_connection()));
            let (tx, alerts) = mpsc::unbounded_channel();

            let dispatcher = Dispatcher::new(
                Analyzer::new(feed.clone(), 500),
                store.clone(),
                Arc::new(StreakTracker::new(store.clone())),
                Arc::new(ChannelNotifier { tx }),
            )
            .with_groups_only(groups_only);

            let monitor = FeedMonitor::new(
                feed.clone(),
                store.clone(),
                Arc::new(dispatcher),
                Duration::from_millis(10),
            );

            Self {
                _temp: temp,
                store,
                feed,
                monitor,
                alerts,
            }
        }

        /// Append an outcome and run the cycle it triggers
        async fn push(&mut self, sequence: u32, sum: u32) {
            let outcome = Outcome::new(sequence.to_string(), sum, 1_700_000_000 + sequence as i64)
                .with_draw(format!("sum {}", sum));
            assert!(self.feed.insert_outcome(&outcome).unwrap());

            let report = self.monitor.check_new().await.unwrap();
            assert_eq!(report.unwrap().sequence_id, sequence.to_string());
        }

        /// Discard alerts from earlier cycles
        async fn drain(&mut self) {
            while let Ok(Some(_)) =
                tokio::time::timeout(Duration::from_millis(50), self.alerts.recv()).await
            {}
        }

        async fn next_alert(&mut self) -> Alert {
            tokio::time::timeout(Duration::from_secs(2), self.alerts.recv())
                .await
                .expect("alert not delivered in time")
                .expect("notifier channel closed")
        }
    }

    fn find(results: &[PatternResult], pattern: PatternType, attribute: AttributeType) -> Option<&PatternResult> {
        results
            .iter()
            .find(|r| r.pattern_type == pattern && r.attribute_type == attribute)
    }

    #[tokio::test]
    async fn test_streak_lifecycle_across_cycles() {
        let mut harness = Harness::new(true);
        harness.store.ensure_subscriber(-1001).unwrap();
        harness
            .store
            .upsert_rule(-1001, PatternType::Repeat, AttributeType::Size, 3, true)
            .unwrap();

        // size: small, large, large, large
        for (sequence, sum) in [(1000, 3), (1001, 20), (1002, 22)] {
            harness.push(sequence, sum).await;
        }
        harness.drain().await;
        harness.push(1003, 24).await;

        let (subscriber, results, current) = harness.next_alert().await;
        assert_eq!(subscriber, -1001);
        assert_eq!(current.sequence_id, "1003");
        let repeat = find(&results, PatternType::Repeat, AttributeType::Size).unwrap();
        assert_eq!(repeat.count, 3);
        assert_eq!(repeat.start_sequence, "1001");

        // Streak grows: same record, new count
        harness.push(1004, 26).await;
        let (_, results, _) = harness.next_alert().await;
        assert_eq!(
            find(&results, PatternType::Repeat, AttributeType::Size).unwrap().count,
            4
        );

        let size_repeats: Vec<_> = harness
            .store
            .list_streaks(-1001)
            .unwrap()
            .into_iter()
            .filter(|s| s.pattern_type == PatternType::Repeat && s.attribute_type == AttributeType::Size)
            .collect();
        assert_eq!(size_repeats.len(), 1);
        assert_eq!(size_repeats[0].count, 4);
        assert_eq!(size_repeats[0].status, StreakStatus::Active);

        // A small outcome breaks the size repeat
        harness.push(1005, 3).await;

        let active = harness.store.list_active(-1001).await.unwrap();
        assert!(!active
            .iter()
            .any(|s| s.pattern_type == PatternType::Repeat && s.attribute_type == AttributeType::Size));

        let ended = harness
            .store
            .list_streaks(-1001)
            .unwrap()
            .into_iter()
            .find(|s| s.pattern_type == PatternType::Repeat && s.attribute_type == AttributeType::Size)
            .unwrap();
        assert_eq!(ended.status, StreakStatus::Ended);
        assert_eq!(ended.count, 4);
        assert_eq!(ended.start_sequence, "1001");
    }

    #[tokio::test]
    async fn test_each_active_key_has_one_record() {
        let mut harness = Harness::new(true);
        harness.store.ensure_subscriber(-1001).unwrap();

        for (i, sum) in [3, 20, 5, 22, 7, 24, 9, 26, 11, 28].iter().enumerate() {
            harness.push(2000 + i as u32, *sum).await;
        }

        let active = harness.store.list_active(-1001).await.unwrap();
        for streak in &active {
            let same_key = active
                .iter()
                .filter(|s| s.pattern_type == streak.pattern_type && s.attribute_type == streak.attribute_type)
                .count();
            assert_eq!(same_key, 1);
        }
        assert!(!active.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_and_private_subscribers_receive_nothing() {
        let mut harness = Harness::new(true);
        harness.store.ensure_subscriber(-1001).unwrap();
        harness.store.ensure_subscriber(-1002).unwrap();
        harness.store.ensure_subscriber(4242).unwrap();
        harness.store.set_subscriber_enabled(-1002, false).unwrap();

        for (i, sum) in [20, 22, 24, 26, 28, 20].iter().enumerate() {
            harness.push(3000 + i as u32, *sum).await;
        }

        let mut recipients = Vec::new();
        while let Ok(Some((subscriber, _, _))) =
            tokio::time::timeout(Duration::from_millis(200), harness.alerts.recv()).await
        {
            recipients.push(subscriber);
        }

        assert!(recipients.contains(&-1001));
        assert!(!recipients.contains(&-1002));
        assert!(!recipients.contains(&4242));
        assert!(harness.store.list_streaks(-1002).unwrap().is_empty());
        assert!(harness.store.list_streaks(4242).unwrap().is_empty());
    }
}
