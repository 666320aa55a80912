//! Common types used across the grading engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tolerance allowed when checking that category weights sum to 100
pub const WEIGHT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Decimal places stored for weights, score limits and evaluation points
pub const POINTS_SCALE: u32 = 2;

/// Largest score limit or evaluation point value the store holds (NUMERIC(8,2))
pub const MAX_POINTS_VALUE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

/// Weight given to accumulated work when a partial/class pair has no configuration
pub const DEFAULT_WEIGHT_ACUMULATIVO: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Weight given to the exam when a partial/class pair has no configuration
pub const DEFAULT_WEIGHT_EXAMEN: Decimal = Decimal::from_parts(40, 0, 0, false, 0);

/// Weight given to make-up work when a partial/class pair has no configuration
pub const DEFAULT_WEIGHT_REPOSICION: Decimal = Decimal::ZERO;

/// Maximum score of a partial when none is configured
pub const DEFAULT_MAX_PARTIAL_SCORE: Decimal = Decimal::ONE_HUNDRED;

/// Passing threshold of a partial when none is configured
pub const DEFAULT_MIN_PASSING_SCORE: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Lifecycle state shared by configuration records.
///
/// Records are never physically removed while something references them;
/// deletion moves them to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    #[default]
    Active,
    Inactive,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Active => "ACTIVE",
            RecordState::Inactive => "INACTIVE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(RecordState::Active),
            "INACTIVE" => Some(RecordState::Inactive),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RecordState::Active)
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round a reported average to two decimals, halves away from zero
pub fn round_average(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Arithmetic mean of a set of decimals; zero for an empty set
pub fn mean<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let mut sum = Decimal::ZERO;
    let mut count: u32 = 0;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(count)
    }
}
