//! The six streak pattern matchers
//!
//! Every matcher takes attributes ordered **oldest → newest** and scans
//! backward from the newest entry. The first mismatch ends the scan: there
//! is no skipping and no fuzzy matching, so each matcher reports at most one
//! result, the maximal backward extension.
//!
//! Histories that are too short for a shape yield an unmatched result, never
//! an error.
//!
//! | Pattern                 | Dimension(s)   | Shape (newest last)   |
//! |-------------------------|----------------|-----------------------|
//! | `Repeat`                | one            | a a a a               |
//! | `Alternate`             | one            | a b a b               |
//! | `GroupedRepeat`         | one            | a b b a b b           |
//! | `FixedAlternateCombo`   | size + parity  | (s,p) (s,q) (s,p)     |
//! | `DualAlternateCombo`    | size + parity  | (s,p) (t,q) (s,p)     |
//! | `ComboRepeat`           | size + parity  | (s,p) (s,p) (s,p)     |

use super::types::{AttributeType, Attributes, PatternResult, PatternType};

/// Dispatch to the matcher for `pattern_type`
///
/// Combo patterns ignore `attribute_type` and always report `SizeParity`.
pub fn run_matcher(
    pattern_type: PatternType,
    attrs: &[Attributes],
    attribute_type: AttributeType,
    min_count: u32,
) -> PatternResult {
    match pattern_type {
        PatternType::Repeat => check_repeat(attrs, attribute_type, min_count),
        PatternType::Alternate => check_alternate(attrs, attribute_type, min_count),
        PatternType::GroupedRepeat => check_grouped_repeat(attrs, attribute_type, min_count),
        PatternType::FixedAlternateCombo => check_fixed_alternate_combo(attrs, min_count),
        PatternType::DualAlternateCombo => check_dual_alternate_combo(attrs, min_count),
        PatternType::ComboRepeat => check_combo_repeat(attrs, min_count),
    }
}

/// `repeat`: newest value repeated `count` times
pub fn check_repeat(
    attrs: &[Attributes],
    attribute_type: AttributeType,
    min_count: u32,
) -> PatternResult {
    if attrs.is_empty() || attrs.len() < min_count as usize {
        return PatternResult::unmatched(PatternType::Repeat, attribute_type);
    }

    let count = trailing_run(attrs, attribute_type);
    finish(PatternType::Repeat, attribute_type, attrs, count, min_count)
}

/// `alternate`: two distinct values strictly alternating
pub fn check_alternate(
    attrs: &[Attributes],
    attribute_type: AttributeType,
    min_count: u32,
) -> PatternResult {
    if min_count < 2 || attrs.len() < 2 || attrs.len() < min_count as usize {
        return PatternResult::unmatched(PatternType::Alternate, attribute_type);
    }

    // alternating_run() returns 0 when the two newest values are equal
    let count = alternating_run(attrs, attribute_type);
    finish(PatternType::Alternate, attribute_type, attrs, count, min_count)
}

/// `grouped_repeat`: whole A,B,B triplets with the same A and B
///
/// The reported count is always a multiple of 3; an older partial group is
/// never included.
pub fn check_grouped_repeat(
    attrs: &[Attributes],
    attribute_type: AttributeType,
    min_count: u32,
) -> PatternResult {
    if attrs.len() < 3 || min_count < 3 {
        return PatternResult::unmatched(PatternType::GroupedRepeat, attribute_type);
    }

    let len = attrs.len();
    let newest = attrs[len - 1].value(attribute_type);
    let middle = attrs[len - 2].value(attribute_type);
    let oldest = attrs[len - 3].value(attribute_type);

    // Newest three must read A, B, B
    if oldest == middle || middle != newest {
        return PatternResult::unmatched(PatternType::GroupedRepeat, attribute_type);
    }

    let (a, b) = (oldest, middle);
    let mut count = 3;

    while len - count >= 3 {
        let start = len - count - 3;
        let group_matches = attrs[start].value(attribute_type) == a
            && attrs[start + 1].value(attribute_type) == b
            && attrs[start + 2].value(attribute_type) == b;

        if !group_matches {
            break;
        }
        count += 3;
    }

    let complete = (count / 3) * 3;
    finish(PatternType::GroupedRepeat, attribute_type, attrs, complete, min_count)
}

/// `fixed_alternate_combo`: size constant while parity alternates
pub fn check_fixed_alternate_combo(attrs: &[Attributes], min_count: u32) -> PatternResult {
    let pattern = PatternType::FixedAlternateCombo;
    if min_count < 2 || attrs.len() < 2 || attrs.len() < min_count as usize {
        return PatternResult::unmatched(pattern, AttributeType::SizeParity);
    }

    let newest = &attrs[attrs.len() - 1];
    let previous = &attrs[attrs.len() - 2];
    if newest.size != previous.size || newest.parity == previous.parity {
        return PatternResult::unmatched(pattern, AttributeType::SizeParity);
    }

    // With equal sizes on the two newest entries, alternating combos keep
    // size fixed and flip parity.
    let count = alternating_run(attrs, AttributeType::SizeParity);
    finish(pattern, AttributeType::SizeParity, attrs, count, min_count)
}

/// `dual_alternate_combo`: size and parity both alternate in lockstep
pub fn check_dual_alternate_combo(attrs: &[Attributes], min_count: u32) -> PatternResult {
    let pattern = PatternType::DualAlternateCombo;
    if min_count < 2 || attrs.len() < 2 || attrs.len() < min_count as usize {
        return PatternResult::unmatched(pattern, AttributeType::SizeParity);
    }

    let newest = &attrs[attrs.len() - 1];
    let previous = &attrs[attrs.len() - 2];
    if newest.size == previous.size || newest.parity == previous.parity {
        return PatternResult::unmatched(pattern, AttributeType::SizeParity);
    }

    let count = alternating_run(attrs, AttributeType::SizeParity);
    finish(pattern, AttributeType::SizeParity, attrs, count, min_count)
}

/// `combo_repeat`: identical (size, parity) pair repeating
pub fn check_combo_repeat(attrs: &[Attributes], min_count: u32) -> PatternResult {
    let pattern = PatternType::ComboRepeat;
    if min_count < 2 || attrs.len() < min_count as usize {
        return PatternResult::unmatched(pattern, AttributeType::SizeParity);
    }

    let count = trailing_run(attrs, AttributeType::SizeParity);
    finish(pattern, AttributeType::SizeParity, attrs, count, min_count)
}

/// Length of the trailing run equal to the newest value
fn trailing_run(attrs: &[Attributes], attribute_type: AttributeType) -> usize {
    let Some(last) = attrs.last() else {
        return 0;
    };
    let newest = last.value(attribute_type);

    attrs
        .iter()
        .rev()
        .take_while(|attr| attr.value(attribute_type) == newest)
        .count()
}

/// Length of the trailing run alternating between the two newest values
///
/// Returns 0 when fewer than two entries exist or the two newest are equal.
fn alternating_run(attrs: &[Attributes], attribute_type: AttributeType) -> usize {
    if attrs.len() < 2 {
        return 0;
    }

    let newest = attrs[attrs.len() - 1].value(attribute_type);
    let previous = attrs[attrs.len() - 2].value(attribute_type);
    if newest == previous {
        return 0;
    }

    attrs
        .iter()
        .rev()
        .enumerate()
        .take_while(|(pos, attr)| {
            let expected = if pos % 2 == 0 { newest } else { previous };
            attr.value(attribute_type) == expected
        })
        .count()
}

/// Build the result for a trailing run of `count` entries
fn finish(
    pattern_type: PatternType,
    attribute_type: AttributeType,
    attrs: &[Attributes],
    count: usize,
    min_count: u32,
) -> PatternResult {
    if count == 0 || count < min_count as usize {
        return PatternResult::unmatched(pattern_type, attribute_type);
    }

    let run = &attrs[attrs.len() - count..];

    PatternResult {
        pattern_type,
        attribute_type,
        count: count as u32,
        start_sequence: run[0].sequence_id.clone(),
        current_sequence: run[run.len() - 1].sequence_id.clone(),
        detail: run.iter().map(|attr| attr.value(attribute_type)).collect(),
        matched: true,
    }
}
