//! Rule filter and default rule set

use super::types::{AttributeType, PatternResult, PatternType, Rule};

/// Rules created for every new subscriber: (pattern, attribute, threshold)
///
/// Grouped-repeat thresholds count outcomes, so 3 means one whole group.
pub const DEFAULT_RULES: [(PatternType, AttributeType, u32); 12] = [
    (PatternType::Repeat, AttributeType::Size, 5),
    (PatternType::Repeat, AttributeType::Parity, 5),
    (PatternType::Repeat, AttributeType::Sum, 5),
    (PatternType::Alternate, AttributeType::Size, 2),
    (PatternType::Alternate, AttributeType::Parity, 2),
    (PatternType::Alternate, AttributeType::Sum, 2),
    (PatternType::GroupedRepeat, AttributeType::Size, 3),
    (PatternType::GroupedRepeat, AttributeType::Parity, 3),
    (PatternType::GroupedRepeat, AttributeType::Sum, 3),
    (PatternType::FixedAlternateCombo, AttributeType::SizeParity, 2),
    (PatternType::DualAlternateCombo, AttributeType::SizeParity, 2),
    (PatternType::ComboRepeat, AttributeType::SizeParity, 2),
];

/// Keep results that meet an enabled rule for their (pattern, attribute)
///
/// Each result appears at most once even if several rules match it.
pub fn filter_results(results: &[PatternResult], rules: &[Rule]) -> Vec<PatternResult> {
    results
        .iter()
        .filter(|result| rules.iter().any(|rule| rule_admits(rule, result)))
        .cloned()
        .collect()
}

fn rule_admits(rule: &Rule, result: &PatternResult) -> bool {
    rule.enabled
        && result.matched
        && rule.pattern_type == result.pattern_type
        && rule.attribute_type == result.attribute_type
        && result.count >= rule.threshold
}

/// Apply `steps` threshold increments, clamped to the pattern's bounds
pub fn adjusted_threshold(pattern_type: PatternType, current: u32, steps: i32) -> u32 {
    let (min, max) = pattern_type.threshold_bounds();
    let delta = steps as i64 * pattern_type.threshold_step() as i64;
    let next = (current as i64 + delta).clamp(min as i64, max as i64);
    next as u32
}
