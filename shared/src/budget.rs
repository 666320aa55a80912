//! Category budget validation
//!
//! Compares the points assigned to evaluations in each category against the
//! category's budget in the grading structure. Overshooting is advisory by
//! default; [`BudgetPolicy::Strict`] turns it into a rejection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GradingError, GradingResult};
use crate::models::{Category, Evaluation, ResolvedStructure};

/// How a category's assigned points compare to its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Points remain to be assigned
    Incomplete,
    /// Assigned points match the budget exactly
    Complete,
    /// More points assigned than the budget allows
    Exceeds,
}

impl BudgetStatus {
    pub fn from_remaining(remaining: Decimal) -> Self {
        if remaining > Decimal::ZERO {
            BudgetStatus::Incomplete
        } else if remaining.is_zero() {
            BudgetStatus::Complete
        } else {
            BudgetStatus::Exceeds
        }
    }
}

/// What happens when an evaluation would push a category over budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPolicy {
    /// Save anyway and report the overshoot
    #[default]
    Advisory,
    /// Refuse the write
    Strict,
}

impl BudgetPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            BudgetPolicy::Strict
        } else {
            BudgetPolicy::Advisory
        }
    }
}

/// Budget of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBudget {
    pub category: Category,
    pub weight: Decimal,
    pub limit: Decimal,
    pub assigned_points: Decimal,
    pub remaining: Decimal,
    pub evaluation_count: usize,
    pub status: BudgetStatus,
}

/// Budget of every category of a (partial, class[, section]) view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub partial_id: Uuid,
    pub class_id: Uuid,
    pub section_id: Option<Uuid>,
    pub structure_is_default: bool,
    pub categories: Vec<CategoryBudget>,
}

impl BudgetSummary {
    pub fn category(&self, category: Category) -> Option<&CategoryBudget> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn any_exceeded(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.status == BudgetStatus::Exceeds)
    }
}

/// Compute assigned and remaining points per category.
///
/// Only active evaluations covering the structure's partial and class (and
/// `section_id`, when given) count.
pub fn summarize_budget(
    structure: &ResolvedStructure,
    evaluations: &[Evaluation],
    section_id: Option<Uuid>,
) -> BudgetSummary {
    let partial_id = structure.structure.partial_id;
    let class_id = structure.structure.class_id;

    let in_scope: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.is_active() && e.scope.covers(partial_id, class_id, section_id))
        .collect();

    let categories = Category::ALL
        .iter()
        .map(|&category| {
            let (assigned_points, evaluation_count) = in_scope
                .iter()
                .filter(|e| e.category == category)
                .fold((Decimal::ZERO, 0usize), |(sum, n), e| (sum + e.max_points, n + 1));
            let limit = structure.category_limit(category);
            let remaining = limit - assigned_points;
            CategoryBudget {
                category,
                weight: structure.structure.weights.get(category),
                limit,
                assigned_points,
                remaining,
                evaluation_count,
                status: BudgetStatus::from_remaining(remaining),
            }
        })
        .collect();

    BudgetSummary {
        partial_id,
        class_id,
        section_id,
        structure_is_default: structure.is_default,
        categories,
    }
}

/// Check whether `candidate` may be saved next to `existing`.
///
/// `existing` may contain a previous version of the candidate; it is
/// replaced rather than counted twice. Returns the budget as it would look
/// after the write. Under the strict policy a write that leaves the
/// candidate's category over budget is rejected, unless the category was
/// already over budget and the write does not make it worse.
pub fn admit_evaluation(
    structure: &ResolvedStructure,
    existing: &[Evaluation],
    candidate: &Evaluation,
    policy: BudgetPolicy,
) -> GradingResult<BudgetSummary> {
    admit_in_view(structure, existing, candidate, candidate.scope.section_id, policy)
}

/// One budget a write is checked against: a class's structure, seen either
/// class-wide (`section_id = None`) or from one of its sections
#[derive(Debug, Clone, Copy)]
pub struct BudgetView<'a> {
    pub structure: &'a ResolvedStructure,
    pub section_id: Option<Uuid>,
}

/// Check `candidate` against every view it would count in.
///
/// A partial-wide evaluation counts in every class of its partial, and a
/// class-wide one in every section of its class, so each of those budgets
/// must admit it. Views the candidate does not cover are skipped. Returns the
/// after-write budget of each checked view, in input order.
pub fn admit_in_views(
    views: &[BudgetView<'_>],
    existing: &[Evaluation],
    candidate: &Evaluation,
    policy: BudgetPolicy,
) -> GradingResult<Vec<BudgetSummary>> {
    views
        .iter()
        .filter(|view| {
            let s = &view.structure.structure;
            candidate.scope.covers(s.partial_id, s.class_id, view.section_id)
        })
        .map(|view| admit_in_view(view.structure, existing, candidate, view.section_id, policy))
        .collect()
}

fn admit_in_view(
    structure: &ResolvedStructure,
    existing: &[Evaluation],
    candidate: &Evaluation,
    section_id: Option<Uuid>,
    policy: BudgetPolicy,
) -> GradingResult<BudgetSummary> {
    let before = summarize_budget(structure, existing, section_id);

    let mut after_set: Vec<Evaluation> = existing
        .iter()
        .filter(|e| e.id != candidate.id)
        .cloned()
        .collect();
    after_set.push(candidate.clone());
    let after = summarize_budget(structure, &after_set, section_id);

    if policy == BudgetPolicy::Strict {
        if let (Some(b), Some(a)) = (
            before.category(candidate.category),
            after.category(candidate.category),
        ) {
            let worsened = a.assigned_points > b.assigned_points;
            if a.status == BudgetStatus::Exceeds && worsened {
                return Err(GradingError::validation(
                    "max_points",
                    format!(
                        "{} points would exceed the {} budget of {} by {} in class {}",
                        candidate.max_points,
                        candidate.category,
                        a.limit,
                        -a.remaining,
                        after.class_id
                    ),
                    format!(
                        "{} puntos superarían el límite de {} ({}) por {} en la clase {}",
                        candidate.max_points,
                        candidate.category,
                        a.limit,
                        -a.remaining,
                        after.class_id
                    ),
                ));
            }
        }
    }

    Ok(after)
}
