//! Analyzer - runs the matchers over a bounded history window
//!
//! ## Selection policy
//!
//! ```text
//! for attribute in [size, parity, sum]:
//!     repeat(min 2), alternate(min 2), grouped_repeat(min 3)
//!     → keep the matched result with the greatest count
//!       (ties: first in that order)
//! fixed_alternate_combo(min 2)  → append if matched
//! dual_alternate_combo(min 2)   → append if matched
//! combo_repeat(min 2)           → append if matched
//! ```
//!
//! The same tail of history can look like more than one shape for a single
//! attribute; only the longest is reported so one underlying streak produces
//! one alert. The three combo shapes are mutually exclusive by construction.

use super::attributes::derive_all;
use super::error::{CycleError, HistoryError};
use super::feed::OutcomeFeed;
use super::patterns::run_matcher;
use super::types::{AttributeType, Attributes, Outcome, PatternResult, PatternType};
use std::cmp::Ordering;
use std::sync::Arc;

/// Default number of outcomes fetched per cycle
pub const DEFAULT_HISTORY_WINDOW: usize = 500;

/// Matchers competing per single-dimension attribute, in tie-break order
const SINGLE_DIMENSION_MATCHERS: [(PatternType, u32); 3] = [
    (PatternType::Repeat, 2),
    (PatternType::Alternate, 2),
    (PatternType::GroupedRepeat, 3),
];

const COMBO_MATCHERS: [(PatternType, u32); 3] = [
    (PatternType::FixedAlternateCombo, 2),
    (PatternType::DualAlternateCombo, 2),
    (PatternType::ComboRepeat, 2),
];

pub struct Analyzer {
    feed: Arc<dyn OutcomeFeed>,
    window: usize,
}

impl Analyzer {
    pub fn new(feed: Arc<dyn OutcomeFeed>, window: usize) -> Self {
        Self { feed, window }
    }

    /// Fetch the latest window from the feed and analyze it
    ///
    /// The feed returns newest → oldest; it is reversed and checked here.
    pub async fn analyze_latest(&self) -> Result<Vec<PatternResult>, CycleError> {
        let newest_first = self.feed.get_history(self.window).await?;

        if newest_first.is_empty() {
            log::debug!("📭 Empty history window, nothing to analyze");
            return Ok(Vec::new());
        }

        let history = into_oldest_first(newest_first)?;
        let results = analyze_attributes(&derive_all(&history));

        log::debug!(
            "🔍 Analyzed {} outcomes → {} candidate streaks",
            history.len(),
            results.len()
        );

        Ok(results)
    }
}

/// Analyze a history ordered oldest → newest
///
/// Returns `HistoryError::OutOfOrder` if the ordering precondition does not
/// hold. An empty history yields an empty list.
pub fn analyze(history: &[Outcome]) -> Result<Vec<PatternResult>, HistoryError> {
    check_oldest_first(history)?;
    Ok(analyze_attributes(&derive_all(history)))
}

/// Run every matcher over already-derived attributes (oldest → newest)
pub fn analyze_attributes(attrs: &[Attributes]) -> Vec<PatternResult> {
    let mut results = Vec::new();

    if attrs.is_empty() {
        return results;
    }

    for attribute_type in AttributeType::single_dimensions() {
        let candidates = SINGLE_DIMENSION_MATCHERS
            .into_iter()
            .map(|(pattern_type, min_count)| run_matcher(pattern_type, attrs, attribute_type, min_count));

        if let Some(result) = select_longest(candidates) {
            results.push(result);
        }
    }

    for (pattern_type, min_count) in COMBO_MATCHERS {
        let result = run_matcher(pattern_type, attrs, AttributeType::SizeParity, min_count);
        if result.matched {
            results.push(result);
        }
    }

    results
}

/// Keep the matched candidate with the greatest count
///
/// Strictly greater: on a tie the earlier candidate wins.
pub fn select_longest(candidates: impl IntoIterator<Item = PatternResult>) -> Option<PatternResult> {
    let mut longest: Option<PatternResult> = None;

    for result in candidates.into_iter().filter(|r| r.matched) {
        let is_longer = longest
            .as_ref()
            .map_or(true, |current| result.count > current.count);
        if is_longer {
            longest = Some(result);
        }
    }

    longest
}

/// Reverse a newest-first feed response and verify the result
pub fn into_oldest_first(mut newest_first: Vec<Outcome>) -> Result<Vec<Outcome>, HistoryError> {
    newest_first.reverse();
    check_oldest_first(&newest_first)?;
    Ok(newest_first)
}

/// Outcomes must be non-decreasing oldest → newest
///
/// Ordered by `open_time`, then by sequence id for outcomes drawn at the
/// same time. This is the order `SqliteOutcomeFeed` returns them in.
pub fn check_oldest_first(history: &[Outcome]) -> Result<(), HistoryError> {
    for pair in history.windows(2) {
        if outcome_cmp(&pair[0], &pair[1]) == Ordering::Greater {
            return Err(HistoryError::OutOfOrder {
                previous: pair[0].sequence_id.clone(),
                next: pair[1].sequence_id.clone(),
            });
        }
    }
    Ok(())
}

fn outcome_cmp(a: &Outcome, b: &Outcome) -> Ordering {
    a.open_time
        .cmp(&b.open_time)
        .then_with(|| sequence_cmp(&a.sequence_id, &b.sequence_id))
}

/// Order sequence ids by length, then lexically
///
/// Draw labels share one format and grow in width ("999" → "1000",
/// "20240101-9" → "20240101-10"), so a longer label is a later draw.
pub fn sequence_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.cmp(b))
}
