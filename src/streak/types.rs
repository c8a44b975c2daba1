//! Core data types for streak detection
//!
//! Value objects only: outcomes from the feed, derived attributes, pattern
//! results produced by the analyzer, subscriber rules and persisted streaks.
//!
//! Persisted enums round-trip through `as_str()` / `from_str()` so the
//! database never sees Rust debug names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sums strictly below this value are `small`, everything else is `large`
pub const SIZE_THRESHOLD: u32 = 14;

/// One observed draw as delivered by the feed
///
/// Immutable once recorded. `sequence_id` orders outcomes (numeric draw
/// labels such as "3312345"), `draw` is the raw number string used only
/// for rendering alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub sequence_id: String,
    pub sum: u32,
    /// Unix timestamp (seconds) of the draw
    pub open_time: i64,
    pub draw: String,
}

impl Outcome {
    pub fn new(sequence_id: impl Into<String>, sum: u32, open_time: i64) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            sum,
            open_time,
            draw: String::new(),
        }
    }

    pub fn with_draw(mut self, draw: impl Into<String>) -> Self {
        self.draw = draw.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    Small,
    Large,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parity::Odd => "odd",
            Parity::Even => "even",
        }
    }
}

/// Categorical projection of one outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub sequence_id: String,
    pub size: Size,
    pub parity: Parity,
    pub sum: u32,
}

impl Attributes {
    /// Value of this entry along one attribute dimension
    pub fn value(&self, attribute_type: AttributeType) -> AttributeValue {
        match attribute_type {
            AttributeType::Size => AttributeValue::Size(self.size),
            AttributeType::Parity => AttributeValue::Parity(self.parity),
            AttributeType::Sum => AttributeValue::Sum(self.sum),
            AttributeType::SizeParity => AttributeValue::Combo(self.size, self.parity),
        }
    }
}

/// A single matched value in a pattern's detail trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Size(Size),
    Parity(Parity),
    Sum(u32),
    Combo(Size, Parity),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Size(size) => write!(f, "{}", size.as_str()),
            AttributeValue::Parity(parity) => write!(f, "{}", parity.as_str()),
            AttributeValue::Sum(sum) => write!(f, "{}", sum),
            AttributeValue::Combo(size, parity) => {
                write!(f, "{}-{}", size.as_str(), parity.as_str())
            }
        }
    }
}

/// Which derived dimension(s) a pattern test operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Size,
    Parity,
    Sum,
    SizeParity,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Size => "size",
            AttributeType::Parity => "parity",
            AttributeType::Sum => "sum",
            AttributeType::SizeParity => "size_parity",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "size" => Some(AttributeType::Size),
            "parity" => Some(AttributeType::Parity),
            "sum" => Some(AttributeType::Sum),
            "size_parity" => Some(AttributeType::SizeParity),
            _ => None,
        }
    }

    /// Dimensions scanned by the repeat / alternate / grouped-repeat matchers
    pub fn single_dimensions() -> [AttributeType; 3] {
        [AttributeType::Size, AttributeType::Parity, AttributeType::Sum]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttributeType::Size => "Size",
            AttributeType::Parity => "Parity",
            AttributeType::Sum => "Sum",
            AttributeType::SizeParity => "Combo",
        }
    }
}

/// The six recognized streak shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Same value N times (a a a a)
    Repeat,
    /// Two values strictly alternating (a b a b)
    Alternate,
    /// Whole A,B,B triplets repeating (a b b a b b)
    GroupedRepeat,
    /// Size fixed, parity alternating
    FixedAlternateCombo,
    /// Size and parity both alternating in lockstep
    DualAlternateCombo,
    /// Identical (size, parity) pair repeating
    ComboRepeat,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Repeat => "repeat",
            PatternType::Alternate => "alternate",
            PatternType::GroupedRepeat => "grouped_repeat",
            PatternType::FixedAlternateCombo => "fixed_alternate_combo",
            PatternType::DualAlternateCombo => "dual_alternate_combo",
            PatternType::ComboRepeat => "combo_repeat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "repeat" => Some(PatternType::Repeat),
            "alternate" => Some(PatternType::Alternate),
            "grouped_repeat" => Some(PatternType::GroupedRepeat),
            "fixed_alternate_combo" => Some(PatternType::FixedAlternateCombo),
            "dual_alternate_combo" => Some(PatternType::DualAlternateCombo),
            "combo_repeat" => Some(PatternType::ComboRepeat),
            _ => None,
        }
    }

    pub fn all() -> [PatternType; 6] {
        [
            PatternType::Repeat,
            PatternType::Alternate,
            PatternType::GroupedRepeat,
            PatternType::FixedAlternateCombo,
            PatternType::DualAlternateCombo,
            PatternType::ComboRepeat,
        ]
    }

    pub fn is_combo(&self) -> bool {
        matches!(
            self,
            PatternType::FixedAlternateCombo
                | PatternType::DualAlternateCombo
                | PatternType::ComboRepeat
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PatternType::Repeat => "Repeat",
            PatternType::Alternate => "Alternate",
            PatternType::GroupedRepeat => "ABB",
            PatternType::FixedAlternateCombo => "Fixed alternate",
            PatternType::DualAlternateCombo => "Dual alternate",
            PatternType::ComboRepeat => "Combo repeat",
        }
    }

    /// Threshold adjustment step; grouped-repeat moves one whole group at a time
    pub fn threshold_step(&self) -> u32 {
        match self {
            PatternType::GroupedRepeat => 3,
            _ => 1,
        }
    }

    /// Inclusive (min, max) bounds an administrator may set
    pub fn threshold_bounds(&self) -> (u32, u32) {
        match self {
            PatternType::GroupedRepeat => (3, 60),
            _ => (2, 20),
        }
    }
}

/// Output of a single matcher invocation
///
/// `count`, `start_sequence` and `current_sequence` are only meaningful
/// when `matched` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern_type: PatternType,
    pub attribute_type: AttributeType,
    pub count: u32,
    pub start_sequence: String,
    pub current_sequence: String,
    /// Matched values, oldest first
    pub detail: Vec<AttributeValue>,
    pub matched: bool,
}

impl PatternResult {
    pub fn unmatched(pattern_type: PatternType, attribute_type: AttributeType) -> Self {
        Self {
            pattern_type,
            attribute_type,
            count: 0,
            start_sequence: String::new(),
            current_sequence: String::new(),
            detail: Vec::new(),
            matched: false,
        }
    }

    pub fn detail_labels(&self) -> Vec<String> {
        self.detail.iter().map(|v| v.to_string()).collect()
    }

    /// Identity of the streak this result belongs to
    pub fn streak_key(&self) -> (PatternType, AttributeType, &str) {
        (self.pattern_type, self.attribute_type, self.start_sequence.as_str())
    }
}

/// Subscriber-scoped alert gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub subscriber_id: i64,
    pub pattern_type: PatternType,
    pub attribute_type: AttributeType,
    pub threshold: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakStatus {
    Active,
    Ended,
}

impl StreakStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakStatus::Active => "active",
            StreakStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(StreakStatus::Active),
            "ended" => Some(StreakStatus::Ended),
            _ => None,
        }
    }
}

/// Persisted tracking record (table `streak_alerts`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Assigned by the store on insert; 0 before that
    pub id: i64,
    pub subscriber_id: i64,
    pub pattern_type: PatternType,
    pub attribute_type: AttributeType,
    pub status: StreakStatus,
    pub start_sequence: String,
    pub current_sequence: String,
    pub count: u32,
    pub detail: Vec<String>,
    pub last_alert_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Streak {
    /// Fresh active record for a result that has no active streak yet
    pub fn from_result(subscriber_id: i64, result: &PatternResult, now: i64) -> Self {
        Self {
            id: 0,
            subscriber_id,
            pattern_type: result.pattern_type,
            attribute_type: result.attribute_type,
            status: StreakStatus::Active,
            start_sequence: result.start_sequence.clone(),
            current_sequence: result.current_sequence.clone(),
            count: result.count,
            detail: result.detail_labels(),
            last_alert_count: result.count,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields rewritten in place while a streak continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current_sequence: String,
    pub count: u32,
    pub detail: Vec<String>,
    pub last_alert_count: u32,
    pub updated_at: i64,
}

impl StreakUpdate {
    pub fn from_result(result: &PatternResult, now: i64) -> Self {
        Self {
            current_sequence: result.current_sequence.clone(),
            count: result.count,
            detail: result.detail_labels(),
            last_alert_count: result.count,
            updated_at: now,
        }
    }
}

/// Summary of the outcome that triggered a cycle, rendered in alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentOutcome {
    pub sequence_id: String,
    pub draw: String,
    pub sum: u32,
    pub size: Size,
    pub parity: Parity,
}

impl CurrentOutcome {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let attrs = super::attributes::derive(outcome);
        Self {
            sequence_id: outcome.sequence_id.clone(),
            draw: outcome.draw.clone(),
            sum: outcome.sum,
            size: attrs.size,
            parity: attrs.parity,
        }
    }
}
