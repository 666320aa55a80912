//! Evaluation models
//!
//! An evaluation's category is fixed when it is created. Edits go through
//! [`EvaluationUpdate`], which can restate the category but never change it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Category, EvaluationTipo};
use crate::error::{GradingError, GradingResult};
use crate::types::RecordState;

/// Where an evaluation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationScope {
    pub partial_id: Uuid,
    pub period_id: Uuid,
    /// `None` means the evaluation applies to every class of the partial
    pub class_id: Option<Uuid>,
    /// `None` means the evaluation applies to every section of the class
    pub section_id: Option<Uuid>,
}

impl EvaluationScope {
    /// Whether this evaluation counts for the given partial/class/section view.
    ///
    /// A section-specific evaluation only counts when the view names that section.
    pub fn covers(&self, partial_id: Uuid, class_id: Uuid, section_id: Option<Uuid>) -> bool {
        if self.partial_id != partial_id {
            return false;
        }
        if let Some(own_class) = self.class_id {
            if own_class != class_id {
                return false;
            }
        }
        match self.section_id {
            None => true,
            Some(own_section) => section_id == Some(own_section),
        }
    }
}

/// A gradable evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub max_points: Decimal,
    #[serde(flatten)]
    pub scope: EvaluationScope,
    pub starts_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    /// Always 1; category weighting comes from the grading structure
    pub weight: Decimal,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Build a new active evaluation from a validated draft
    pub fn from_draft(id: Uuid, draft: EvaluationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            category: draft.tipo.into(),
            max_points: draft.max_points,
            scope: draft.scope,
            starts_at: draft.starts_at,
            closes_at: draft.closes_at,
            weight: Decimal::ONE,
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Apply an edit, keeping the category locked.
    ///
    /// Restating the current category is accepted; asking for another one is
    /// rejected so historical category totals stay consistent.
    pub fn apply_update(&self, update: EvaluationUpdate, now: DateTime<Utc>) -> GradingResult<Self> {
        if let Some(tipo) = update.tipo {
            let requested: Category = tipo.into();
            if requested != self.category {
                return Err(GradingError::validation(
                    "tipo",
                    format!(
                        "Category cannot change from {} to {}; create a new evaluation instead",
                        self.category, requested
                    ),
                    format!(
                        "La categoría no puede cambiar de {} a {}; cree una nueva evaluación",
                        self.category, requested
                    ),
                ));
            }
        }

        Ok(Self {
            id: self.id,
            title: update.title.trim().to_string(),
            description: update.description,
            category: self.category,
            max_points: update.max_points,
            scope: update.scope,
            starts_at: update.starts_at,
            closes_at: update.closes_at,
            weight: self.weight,
            state: self.state,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

/// Input for creating an evaluation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvaluationDraft {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub tipo: EvaluationTipo,
    pub max_points: Decimal,
    #[serde(flatten)]
    pub scope: EvaluationScope,
    pub starts_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

/// Input for editing an evaluation.
///
/// Carries the same fields as a draft except that `tipo` is only an assertion.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvaluationUpdate {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub tipo: Option<EvaluationTipo>,
    pub max_points: Decimal,
    #[serde(flatten)]
    pub scope: EvaluationScope,
    pub starts_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

/// Fields shared by drafts and updates that the catalog validates
pub trait EvaluationFields {
    fn title(&self) -> &str;
    fn max_points(&self) -> Decimal;
    fn scope(&self) -> &EvaluationScope;
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>);
}

impl EvaluationFields for EvaluationDraft {
    fn title(&self) -> &str {
        &self.title
    }
    fn max_points(&self) -> Decimal {
        self.max_points
    }
    fn scope(&self) -> &EvaluationScope {
        &self.scope
    }
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.starts_at, self.closes_at)
    }
}

impl EvaluationFields for EvaluationUpdate {
    fn title(&self) -> &str {
        &self.title
    }
    fn max_points(&self) -> Decimal {
        self.max_points
    }
    fn scope(&self) -> &EvaluationScope {
        &self.scope
    }
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.starts_at, self.closes_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scope() -> EvaluationScope {
        EvaluationScope {
            partial_id: Uuid::new_v4(),
            period_id: Uuid::new_v4(),
            class_id: Some(Uuid::new_v4()),
            section_id: None,
        }
    }

    fn draft(tipo: EvaluationTipo) -> EvaluationDraft {
        let now = Utc::now();
        EvaluationDraft {
            title: "  Quiz 1 ".to_string(),
            description: None,
            tipo,
            max_points: Decimal::from(10),
            scope: scope(),
            starts_at: now,
            closes_at: now + Duration::days(2),
        }
    }

    fn update_from(evaluation: &Evaluation, tipo: Option<EvaluationTipo>) -> EvaluationUpdate {
        EvaluationUpdate {
            title: "Quiz 1 (revised)".to_string(),
            description: Some("Chapters 1-2".to_string()),
            tipo,
            max_points: Decimal::from(15),
            scope: evaluation.scope,
            starts_at: evaluation.starts_at,
            closes_at: evaluation.closes_at,
        }
    }

    #[test]
    fn draft_becomes_active_evaluation_with_unit_weight() {
        let evaluation = Evaluation::from_draft(Uuid::new_v4(), draft(EvaluationTipo::Normal), Utc::now());
        assert_eq!(evaluation.title, "Quiz 1");
        assert_eq!(evaluation.category, Category::Acumulativo);
        assert_eq!(evaluation.weight, Decimal::ONE);
        assert!(evaluation.is_active());
    }

    #[test]
    fn update_keeps_category_when_tipo_omitted() {
        let evaluation = Evaluation::from_draft(Uuid::new_v4(), draft(EvaluationTipo::Examen), Utc::now());
        let updated = evaluation
            .apply_update(update_from(&evaluation, None), Utc::now())
            .unwrap();
        assert_eq!(updated.category, Category::Examen);
        assert_eq!(updated.max_points, Decimal::from(15));
        assert_eq!(updated.created_at, evaluation.created_at);
    }

    #[test]
    fn update_accepts_restated_category() {
        let evaluation = Evaluation::from_draft(Uuid::new_v4(), draft(EvaluationTipo::Examen), Utc::now());
        let update = update_from(&evaluation, Some(EvaluationTipo::Examen));
        assert!(evaluation.apply_update(update, Utc::now()).is_ok());
    }

    #[test]
    fn update_rejects_category_change() {
        let evaluation = Evaluation::from_draft(Uuid::new_v4(), draft(EvaluationTipo::Normal), Utc::now());
        let update = update_from(&evaluation, Some(EvaluationTipo::Reposicion));
        let err = evaluation.apply_update(update, Utc::now()).unwrap_err();
        assert_eq!(err.violations()[0].field, "tipo");
    }

    #[test]
    fn class_wide_evaluation_covers_every_section() {
        let s = scope();
        let class_id = s.class_id.unwrap();
        assert!(s.covers(s.partial_id, class_id, None));
        assert!(s.covers(s.partial_id, class_id, Some(Uuid::new_v4())));
        assert!(!s.covers(s.partial_id, Uuid::new_v4(), None));
        assert!(!s.covers(Uuid::new_v4(), class_id, None));
    }

    #[test]
    fn section_evaluation_only_covers_its_section() {
        let section_id = Uuid::new_v4();
        let s = EvaluationScope {
            section_id: Some(section_id),
            ..scope()
        };
        let class_id = s.class_id.unwrap();
        assert!(s.covers(s.partial_id, class_id, Some(section_id)));
        assert!(!s.covers(s.partial_id, class_id, Some(Uuid::new_v4())));
        assert!(!s.covers(s.partial_id, class_id, None));
    }

    #[test]
    fn partial_wide_evaluation_covers_any_class() {
        let s = EvaluationScope {
            class_id: None,
            ..scope()
        };
        assert!(s.covers(s.partial_id, Uuid::new_v4(), None));
    }
}
