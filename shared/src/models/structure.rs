//! Grading structure models
//!
//! A grading structure says, for one (partial, class) pair, how the three
//! categories split the partial's maximum score and where the pass mark sits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Category;
use crate::types::{
    RecordState, DEFAULT_MAX_PARTIAL_SCORE, DEFAULT_MIN_PASSING_SCORE, DEFAULT_WEIGHT_ACUMULATIVO,
    DEFAULT_WEIGHT_EXAMEN, DEFAULT_WEIGHT_REPOSICION,
};

/// Percentage weight of each category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub acumulativo: Decimal,
    pub examen: Decimal,
    pub reposicion: Decimal,
}

impl CategoryWeights {
    pub fn new(acumulativo: Decimal, examen: Decimal, reposicion: Decimal) -> Self {
        Self {
            acumulativo,
            examen,
            reposicion,
        }
    }

    pub fn get(&self, category: Category) -> Decimal {
        match category {
            Category::Acumulativo => self.acumulativo,
            Category::Examen => self.examen,
            Category::Reposicion => self.reposicion,
        }
    }

    pub fn total(&self) -> Decimal {
        self.acumulativo + self.examen + self.reposicion
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            acumulativo: DEFAULT_WEIGHT_ACUMULATIVO,
            examen: DEFAULT_WEIGHT_EXAMEN,
            reposicion: DEFAULT_WEIGHT_REPOSICION,
        }
    }
}

/// Score ceiling and pass mark of a partial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreLimits {
    #[serde(default = "default_max_partial_score")]
    pub max_partial_score: Decimal,
    pub min_passing_score: Decimal,
}

fn default_max_partial_score() -> Decimal {
    DEFAULT_MAX_PARTIAL_SCORE
}

impl Default for ScoreLimits {
    fn default() -> Self {
        Self {
            max_partial_score: DEFAULT_MAX_PARTIAL_SCORE,
            min_passing_score: DEFAULT_MIN_PASSING_SCORE,
        }
    }
}

/// Grading structure of one (partial, class) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingStructure {
    pub partial_id: Uuid,
    pub class_id: Uuid,
    pub weights: CategoryWeights,
    #[serde(flatten)]
    pub limits: ScoreLimits,
    pub notes: Option<String>,
    pub state: RecordState,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GradingStructure {
    /// The documented fallback: 60/40/0 out of 100, passing at 60
    pub fn implied_default(partial_id: Uuid, class_id: Uuid) -> Self {
        Self {
            partial_id,
            class_id,
            weights: CategoryWeights::default(),
            limits: ScoreLimits::default(),
            notes: None,
            state: RecordState::Active,
            created_at: None,
            updated_at: None,
        }
    }

    /// Point budget of a category: its weight applied to the partial's maximum score
    pub fn category_limit(&self, category: Category) -> Decimal {
        self.weights.get(category) / Decimal::ONE_HUNDRED * self.limits.max_partial_score
    }

    pub fn min_passing_score(&self) -> Decimal {
        self.limits.min_passing_score
    }

    pub fn max_partial_score(&self) -> Decimal {
        self.limits.max_partial_score
    }
}

/// Structure returned by a lookup, tagged with whether it is configured or implied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStructure {
    #[serde(flatten)]
    pub structure: GradingStructure,
    pub is_default: bool,
}

impl ResolvedStructure {
    /// Resolve a stored row into the structure callers should use.
    ///
    /// Missing or inactive rows fall back to the implied default. The default
    /// is only ever returned, never written back.
    pub fn resolve(partial_id: Uuid, class_id: Uuid, stored: Option<GradingStructure>) -> Self {
        match stored {
            Some(structure) if structure.state.is_active() => Self {
                structure,
                is_default: false,
            },
            _ => Self {
                structure: GradingStructure::implied_default(partial_id, class_id),
                is_default: true,
            },
        }
    }

    pub fn category_limit(&self, category: Category) -> Decimal {
        self.structure.category_limit(category)
    }
}

/// Full replacement of a structure's editable fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureInput {
    pub weights: CategoryWeights,
    #[serde(flatten)]
    pub limits: ScoreLimits,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_weight_share_of_max_score() {
        let mut structure = GradingStructure::implied_default(Uuid::new_v4(), Uuid::new_v4());
        structure.limits.max_partial_score = Decimal::from(20);
        assert_eq!(structure.category_limit(Category::Acumulativo), Decimal::from(12));
        assert_eq!(structure.category_limit(Category::Examen), Decimal::from(8));
        assert_eq!(structure.category_limit(Category::Reposicion), Decimal::ZERO);
    }

    #[test]
    fn missing_structure_resolves_to_default() {
        let resolved = ResolvedStructure::resolve(Uuid::new_v4(), Uuid::new_v4(), None);
        assert!(resolved.is_default);
        assert_eq!(resolved.structure.weights, CategoryWeights::default());
        assert_eq!(resolved.structure.created_at, None);
    }

    #[test]
    fn inactive_structure_resolves_to_default() {
        let partial_id = Uuid::new_v4();
        let class_id = Uuid::new_v4();
        let mut stored = GradingStructure::implied_default(partial_id, class_id);
        stored.weights = CategoryWeights::new(Decimal::from(50), Decimal::from(50), Decimal::ZERO);
        stored.state = RecordState::Inactive;

        let resolved = ResolvedStructure::resolve(partial_id, class_id, Some(stored));
        assert!(resolved.is_default);
        assert_eq!(resolved.structure.weights.acumulativo, Decimal::from(60));
    }

    #[test]
    fn resolved_structure_serializes_default_flag() {
        let resolved = ResolvedStructure::resolve(Uuid::new_v4(), Uuid::new_v4(), None);
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["is_default"], serde_json::Value::Bool(true));
        assert_eq!(json["state"], "ACTIVE");
        assert!(json.get("max_partial_score").is_some());
    }
}
