//! Dispatcher - one analysis cycle per new outcome
//!
//! ## Flow
//!
//! ```text
//! Outcome
//!     ↓
//! Analyzer::analyze_latest()        (once per cycle)
//!     ↓
//! ConfigStore::get_active_subscribers()
//!     ↓  one tokio task per subscriber
//! rules → filter_results → StreakTracker::track (per result)
//!     ↓
//! StreakTracker::end_inactive (full result set)
//!     ↓
//! Notifier::notify (spawned, fire-and-forget)
//! ```
//!
//! A failure while processing one subscriber never affects another.

use super::analyzer::Analyzer;
use super::db::ConfigStore;
use super::error::CycleError;
use super::notifier::Notifier;
use super::rules::filter_results;
use super::tracker::StreakTracker;
use super::types::{CurrentOutcome, Outcome, PatternResult};
use std::sync::Arc;

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sequence_id: String,
    /// Patterns reported by the analyzer
    pub results: usize,
    pub subscribers: usize,
    /// Subscribers skipped because they are private chats
    pub skipped: usize,
    /// Pattern results sent across all subscribers
    pub alerts: usize,
    pub new_streaks: usize,
    pub ended_streaks: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct SubscriberReport {
    alerts: usize,
    new_streaks: usize,
    ended_streaks: usize,
}

/// Shared handles cloned into every subscriber task
#[derive(Clone)]
struct SubscriberPipeline {
    config_store: Arc<dyn ConfigStore>,
    tracker: Arc<StreakTracker>,
    notifier: Arc<dyn Notifier>,
}

impl SubscriberPipeline {
    async fn process(
        self,
        subscriber_id: i64,
        results: Arc<Vec<PatternResult>>,
        current: Arc<CurrentOutcome>,
    ) -> SubscriberReport {
        let mut report = SubscriberReport::default();

        let rules = match self.config_store.get_enabled_rules(subscriber_id).await {
            Ok(rules) => rules,
            Err(e) => {
                log::warn!("⚠️  Failed to load rules for subscriber {}: {}", subscriber_id, e);
                return report;
            }
        };

        let mut alerts = Vec::new();
        for result in filter_results(&results, &rules) {
            let decision = self.tracker.track(subscriber_id, &result).await;
            if decision.is_new {
                report.new_streaks += 1;
            }
            if decision.should_alert {
                alerts.push(result);
            }
        }

        report.ended_streaks = self.tracker.end_inactive(subscriber_id, &results).await;
        report.alerts = alerts.len();

        if !alerts.is_empty() {
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(subscriber_id, &alerts, &current).await {
                    log::error!("❌ Alert delivery to {} failed: {}", subscriber_id, e);
                }
            });
        }

        report
    }
}

pub struct Dispatcher {
    analyzer: Analyzer,
    pipeline: SubscriberPipeline,
    groups_only: bool,
}

impl Dispatcher {
    pub fn new(
        analyzer: Analyzer,
        config_store: Arc<dyn ConfigStore>,
        tracker: Arc<StreakTracker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            analyzer,
            pipeline: SubscriberPipeline {
                config_store,
                tracker,
                notifier,
            },
            groups_only: false,
        }
    }

    /// Skip subscribers with positive ids (private chats)
    pub fn with_groups_only(mut self, groups_only: bool) -> Self {
        self.groups_only = groups_only;
        self
    }

    /// Run one cycle for the outcome that just arrived
    ///
    /// Fails only if analysis or the subscriber listing fails; per-subscriber
    /// errors are logged and counted as zero activity.
    pub async fn run_cycle(&self, outcome: &Outcome) -> Result<CycleReport, CycleError> {
        let results = Arc::new(self.analyzer.analyze_latest().await?);
        let subscribers = self.pipeline.config_store.get_active_subscribers().await?;
        let current = Arc::new(CurrentOutcome::from_outcome(outcome));

        let mut report = CycleReport {
            sequence_id: outcome.sequence_id.clone(),
            results: results.len(),
            ..Default::default()
        };

        let mut handles = Vec::new();
        for subscriber_id in subscribers {
            if self.groups_only && subscriber_id > 0 {
                report.skipped += 1;
                continue;
            }

            let pipeline = self.pipeline.clone();
            let results = results.clone();
            let current = current.clone();
            handles.push((
                subscriber_id,
                tokio::spawn(pipeline.process(subscriber_id, results, current)),
            ));
        }

        for (subscriber_id, handle) in handles {
            match handle.await {
                Ok(subscriber) => {
                    report.subscribers += 1;
                    report.alerts += subscriber.alerts;
                    report.new_streaks += subscriber.new_streaks;
                    report.ended_streaks += subscriber.ended_streaks;
                }
                Err(e) => log::error!("❌ Subscriber {} task failed: {}", subscriber_id, e),
            }
        }

        log::info!(
            "🔄 Cycle {} complete: {} patterns, {} subscribers, {} alerts ({} new, {} ended)",
            report.sequence_id,
            report.results,
            report.subscribers,
            report.alerts,
            report.new_streaks,
            report.ended_streaks
        );

        Ok(report)
    }
}
