//! Attribute derivation: outcome sum → size / parity

use super::types::{Attributes, Outcome, Parity, Size, SIZE_THRESHOLD};

/// Derive categorical attributes from one outcome
///
/// Total and pure: every sum maps to exactly one size and one parity.
pub fn derive(outcome: &Outcome) -> Attributes {
    let size = if outcome.sum < SIZE_THRESHOLD {
        Size::Small
    } else {
        Size::Large
    };

    let parity = if outcome.sum % 2 == 1 {
        Parity::Odd
    } else {
        Parity::Even
    };

    Attributes {
        sequence_id: outcome.sequence_id.clone(),
        size,
        parity,
        sum: outcome.sum,
    }
}

/// Derive attributes for a whole window, preserving order
pub fn derive_all(outcomes: &[Outcome]) -> Vec<Attributes> {
    outcomes.iter().map(derive).collect()
}
