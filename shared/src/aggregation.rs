//! Partial aggregation
//!
//! Category sums are points, not percentages: they are added straight into
//! the weighted total without re-normalizing against the category budget.
//! A missing or ungraded score counts as 0.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{GradingError, GradingResult};
use crate::models::{
    Category, CategoryTotal, Enrollment, Evaluation, PartialResult, ResolvedStructure, StudentScore,
};

/// Compute one student's result for a partial of a class.
///
/// `evaluations` may contain evaluations from other scopes; only active ones
/// covering the partial, the class and the student's section are used.
/// `scores` may contain other students' scores; they are ignored.
pub fn compute_partial_result(
    student_id: Uuid,
    section_id: Option<Uuid>,
    partial_id: Uuid,
    class_id: Uuid,
    structure: &ResolvedStructure,
    evaluations: &[Evaluation],
    scores: &[StudentScore],
) -> GradingResult<PartialResult> {
    if structure.structure.partial_id != partial_id || structure.structure.class_id != class_id {
        return Err(GradingError::Precondition(format!(
            "structure for partial {} / class {} supplied for partial {} / class {}",
            structure.structure.partial_id, structure.structure.class_id, partial_id, class_id
        )));
    }

    let graded: HashMap<Uuid, Decimal> = scores
        .iter()
        .filter(|s| s.student_id == student_id && s.is_graded())
        .map(|s| (s.evaluation_id, s.raw_score))
        .collect();

    let mut sums: HashMap<Category, Decimal> = HashMap::new();
    let mut evaluation_count = 0usize;
    let mut graded_count = 0usize;

    for evaluation in evaluations
        .iter()
        .filter(|e| e.is_active() && e.scope.covers(partial_id, class_id, section_id))
    {
        evaluation_count += 1;
        let points = match graded.get(&evaluation.id) {
            Some(points) => {
                graded_count += 1;
                *points
            }
            None => Decimal::ZERO,
        };
        *sums.entry(evaluation.category).or_insert(Decimal::ZERO) += points;
    }

    let categories: Vec<CategoryTotal> = Category::ALL
        .iter()
        .map(|&category| {
            let points = sums.get(&category).copied().unwrap_or(Decimal::ZERO);
            let limit = structure.category_limit(category);
            CategoryTotal {
                category,
                points,
                limit,
                remaining: limit - points,
            }
        })
        .collect();

    let weighted_total: Decimal = categories.iter().map(|c| c.points).sum();
    let min_passing_score = structure.structure.min_passing_score();

    Ok(PartialResult {
        student_id,
        partial_id,
        class_id,
        categories,
        weighted_total,
        max_partial_score: structure.structure.max_partial_score(),
        min_passing_score,
        passed: weighted_total >= min_passing_score,
        evaluation_count,
        graded_count,
        structure_is_default: structure.is_default,
    })
}

/// Compute the partial result of every enrolled student of a class.
///
/// Enrollments of other classes are a collaborator error.
pub fn compute_class_results(
    partial_id: Uuid,
    class_id: Uuid,
    structure: &ResolvedStructure,
    enrollments: &[Enrollment],
    evaluations: &[Evaluation],
    scores: &[StudentScore],
) -> GradingResult<Vec<PartialResult>> {
    enrollments
        .iter()
        .map(|enrollment| {
            if enrollment.class_id != class_id {
                return Err(GradingError::Precondition(format!(
                    "enrollment of student {} in class {} supplied for class {}",
                    enrollment.student_id, enrollment.class_id, class_id
                )));
            }
            compute_partial_result(
                enrollment.student_id,
                enrollment.section_id,
                partial_id,
                class_id,
                structure,
                evaluations,
                scores,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationScope, ScoreStatus};
    use crate::types::RecordState;
    use chrono::{Duration, Utc};

    struct Fixture {
        partial_id: Uuid,
        class_id: Uuid,
        structure: ResolvedStructure,
    }

    fn fixture() -> Fixture {
        let partial_id = Uuid::new_v4();
        let class_id = Uuid::new_v4();
        Fixture {
            partial_id,
            class_id,
            structure: ResolvedStructure::resolve(partial_id, class_id, None),
        }
    }

    fn evaluation(f: &Fixture, category: Category, max_points: i64) -> Evaluation {
        let now = Utc::now();
        Evaluation {
            id: Uuid::new_v4(),
            title: format!("{} eval", category),
            description: None,
            category,
            max_points: Decimal::from(max_points),
            scope: EvaluationScope {
                partial_id: f.partial_id,
                period_id: Uuid::new_v4(),
                class_id: Some(f.class_id),
                section_id: None,
            },
            starts_at: now,
            closes_at: now + Duration::days(1),
            weight: Decimal::ONE,
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn score(evaluation: &Evaluation, student_id: Uuid, points: i64) -> StudentScore {
        StudentScore {
            evaluation_id: evaluation.id,
            student_id,
            raw_score: Decimal::from(points),
            status: ScoreStatus::Graded,
            recorded_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn sums_points_per_category() {
        let f = fixture();
        let student = Uuid::new_v4();
        let e1 = evaluation(&f, Category::Acumulativo, 30);
        let e2 = evaluation(&f, Category::Examen, 40);
        let scores = vec![score(&e1, student, 25), score(&e2, student, 35)];

        let result = compute_partial_result(
            student, None, f.partial_id, f.class_id, &f.structure, &[e1, e2], &scores,
        )
        .unwrap();

        assert_eq!(result.category_points(Category::Acumulativo), Decimal::from(25));
        assert_eq!(result.category_points(Category::Examen), Decimal::from(35));
        assert_eq!(result.category_points(Category::Reposicion), Decimal::ZERO);
        assert_eq!(result.weighted_total, Decimal::from(60));
        assert!(result.passed);
        assert_eq!(result.graded_count, 2);
    }

    #[test]
    fn pending_scores_count_as_zero() {
        let f = fixture();
        let student = Uuid::new_v4();
        let e1 = evaluation(&f, Category::Acumulativo, 30);
        let mut pending = score(&e1, student, 30);
        pending.status = ScoreStatus::Pending;

        let result = compute_partial_result(
            student, None, f.partial_id, f.class_id, &f.structure, &[e1], &[pending],
        )
        .unwrap();
        assert_eq!(result.weighted_total, Decimal::ZERO);
        assert_eq!(result.evaluation_count, 1);
        assert_eq!(result.graded_count, 0);
        assert!(!result.passed);
    }

    #[test]
    fn other_students_scores_are_ignored() {
        let f = fixture();
        let student = Uuid::new_v4();
        let e1 = evaluation(&f, Category::Examen, 40);
        let scores = vec![score(&e1, Uuid::new_v4(), 40)];
        let result = compute_partial_result(
            student, None, f.partial_id, f.class_id, &f.structure, &[e1], &scores,
        )
        .unwrap();
        assert_eq!(result.weighted_total, Decimal::ZERO);
    }

    #[test]
    fn overshooting_category_is_not_capped() {
        let f = fixture();
        let student = Uuid::new_v4();
        let e1 = evaluation(&f, Category::Examen, 50);
        let scores = vec![score(&e1, student, 50)];
        let result = compute_partial_result(
            student, None, f.partial_id, f.class_id, &f.structure, &[e1], &scores,
        )
        .unwrap();
        let exam = &result.categories[1];
        assert_eq!(exam.points, Decimal::from(50));
        assert_eq!(exam.remaining, Decimal::from(-10));
        assert_eq!(result.weighted_total, Decimal::from(50));
    }

    #[test]
    fn mismatched_structure_is_a_precondition_failure() {
        let f = fixture();
        let err = compute_partial_result(
            Uuid::new_v4(), None, Uuid::new_v4(), f.class_id, &f.structure, &[], &[],
        )
        .unwrap_err();
        assert!(matches!(err, GradingError::Precondition(_)));
    }

    #[test]
    fn class_results_cover_every_enrollment() {
        let f = fixture();
        let period_id = Uuid::new_v4();
        let enrollments: Vec<Enrollment> = (0..3)
            .map(|_| Enrollment {
                student_id: Uuid::new_v4(),
                class_id: f.class_id,
                section_id: None,
                period_id,
            })
            .collect();
        let results =
            compute_class_results(f.partial_id, f.class_id, &f.structure, &enrollments, &[], &[]).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.weighted_total.is_zero()));
    }

    #[test]
    fn foreign_enrollment_is_rejected() {
        let f = fixture();
        let enrollments = vec![Enrollment {
            student_id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            section_id: None,
            period_id: Uuid::new_v4(),
        }];
        let err = compute_class_results(f.partial_id, f.class_id, &f.structure, &enrollments, &[], &[])
            .unwrap_err();
        assert!(matches!(err, GradingError::Precondition(_)));
    }
}
