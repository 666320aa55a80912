//! Tests for the score recorder rules
//! Verifies bounds, idempotence, optimistic versions and bulk partial success

use std::collections::HashSet;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use shared::{
    apply_score, ensure_gradable, BulkScoreInput, entry_failure, screen_bulk_entries, validate_raw_score,
    Evaluation, EvaluationDraft, EvaluationScope, EvaluationTipo, GradingError, RecordState,
    ScoreEntry, ScoreStatus, StudentScore,
};
use uuid::Uuid;

fn evaluation(max_points: i64) -> Evaluation {
    let starts_at = Utc::now();
    Evaluation::from_draft(
        Uuid::new_v4(),
        EvaluationDraft {
            title: "Tarea 1".to_string(),
            description: None,
            tipo: EvaluationTipo::Normal,
            max_points: Decimal::from(max_points),
            scope: EvaluationScope {
                partial_id: Uuid::new_v4(),
                period_id: Uuid::new_v4(),
                class_id: Some(Uuid::new_v4()),
                section_id: None,
            },
            starts_at,
            closes_at: starts_at + Duration::days(7),
        },
        Utc::now(),
    )
}

/// Record through the pure rules, the way the service does for one entry
fn record(
    existing: Option<&StudentScore>,
    evaluation: &Evaluation,
    student_id: Uuid,
    raw: f64,
    expected_version: Option<i32>,
) -> Result<StudentScore, GradingError> {
    ensure_gradable(evaluation)?;
    let raw_score = validate_raw_score(raw, evaluation.max_points)?;
    apply_score(
        existing,
        evaluation.id,
        student_id,
        raw_score,
        expected_version,
        Utc::now(),
    )
}

// =============================================================================
// Bounds
// =============================================================================

mod bounds {
    use super::*;

    #[test]
    fn max_points_is_accepted() {
        let e = evaluation(30);
        assert!(record(None, &e, Uuid::new_v4(), 30.0, None).is_ok());
    }

    #[test]
    fn just_above_max_is_rejected_with_the_maximum_in_the_message() {
        let e = evaluation(30);
        let err = record(None, &e, Uuid::new_v4(), 30.01, None).unwrap_err();
        let violation = &err.violations()[0];
        assert_eq!(violation.field, "raw_score");
        assert!(violation.message.contains("30"));
    }

    #[test]
    fn just_below_zero_is_rejected() {
        let e = evaluation(30);
        let err = record(None, &e, Uuid::new_v4(), -0.01, None).unwrap_err();
        assert!(err.violations()[0].message.contains("negative"));
    }

    #[test]
    fn zero_is_accepted() {
        let e = evaluation(30);
        let score = record(None, &e, Uuid::new_v4(), 0.0, None).unwrap();
        assert_eq!(score.raw_score, Decimal::ZERO);
        assert_eq!(score.status, ScoreStatus::Graded);
    }

    #[test]
    fn non_finite_values_are_rejected_first() {
        let e = evaluation(30);
        for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = record(None, &e, Uuid::new_v4(), raw, None).unwrap_err();
            assert!(err.violations()[0].message.contains("finite"));
        }
    }

    #[test]
    fn inactive_evaluation_cannot_be_graded() {
        let mut e = evaluation(30);
        e.state = RecordState::Inactive;
        let err = record(None, &e, Uuid::new_v4(), 10.0, None).unwrap_err();
        assert!(matches!(err, GradingError::Referential(ref v) if v.field == "evaluation_id"));
    }
}

// =============================================================================
// Versions
// =============================================================================

mod versions {
    use super::*;

    #[test]
    fn first_recording_is_version_one() {
        let e = evaluation(20);
        let score = record(None, &e, Uuid::new_v4(), 12.5, None).unwrap();
        assert_eq!(score.version, 1);
        assert_eq!(score.raw_score, Decimal::from_f64(12.5).unwrap());
    }

    #[test]
    fn regrading_with_a_new_value_bumps_the_version() {
        let e = evaluation(20);
        let student = Uuid::new_v4();
        let first = record(None, &e, student, 12.0, None).unwrap();
        let second = record(Some(&first), &e, student, 15.0, None).unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.raw_score, Decimal::from(15));
    }

    #[test]
    fn stale_expected_version_is_a_conflict() {
        let e = evaluation(20);
        let student = Uuid::new_v4();
        let first = record(None, &e, student, 12.0, None).unwrap();
        let second = record(Some(&first), &e, student, 14.0, Some(1)).unwrap();
        let err = record(Some(&second), &e, student, 18.0, Some(1)).unwrap_err();
        assert!(matches!(err, GradingError::Conflict(_)));
    }

    #[test]
    fn expecting_version_zero_means_nothing_recorded_yet() {
        let e = evaluation(20);
        assert!(record(None, &e, Uuid::new_v4(), 10.0, Some(0)).is_ok());
        assert!(record(None, &e, Uuid::new_v4(), 10.0, Some(1)).is_err());
    }

    #[test]
    fn omitted_version_is_last_write_wins() {
        let e = evaluation(20);
        let student = Uuid::new_v4();
        let first = record(None, &e, student, 5.0, None).unwrap();
        let second = record(Some(&first), &e, student, 6.0, None).unwrap();
        let third = record(Some(&second), &e, student, 7.0, None).unwrap();
        assert_eq!(third.raw_score, Decimal::from(7));
        assert_eq!(third.version, 3);
    }
}

// =============================================================================
// Bulk recording
// =============================================================================

mod bulk {
    use super::*;

    fn entries(students: &[Uuid], raws: &[f64]) -> Vec<ScoreEntry> {
        students
            .iter()
            .zip(raws)
            .map(|(student_id, raw)| ScoreEntry {
                student_id: *student_id,
                raw_score: serde_json::json!(raw),
                expected_version: None,
            })
            .collect()
    }

    #[test]
    fn one_invalid_entry_does_not_block_the_others() {
        let e = evaluation(20);
        let students: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let enrolled: HashSet<Uuid> = students.iter().copied().collect();
        let batch = entries(&students, &[10.0, 12.0, 25.0, 20.0, 0.0]);

        let (accepted, failed) = screen_bulk_entries(&e, &batch, |id| enrolled.contains(&id));

        assert_eq!(accepted.len(), 4);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 2);
        assert_eq!(failed[0].student_id, students[2]);
        assert_eq!(failed[0].violation.field, "raw_score");

        // every accepted entry persists on its own
        let stored: Vec<StudentScore> = accepted
            .iter()
            .map(|a| apply_score(None, e.id, a.student_id, a.raw_score, a.expected_version, Utc::now()).unwrap())
            .collect();
        assert_eq!(stored.len(), 4);
        assert!(stored.iter().all(|s| s.student_id != students[2]));
    }

    #[test]
    fn malformed_scores_are_itemized_and_the_batch_survives() {
        let e = evaluation(20);
        let students: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let body = serde_json::json!({
            "evaluation_id": e.id,
            "entries": [
                { "student_id": students[0], "raw_score": 15 },
                { "student_id": students[1], "raw_score": "abc" },
                { "student_id": students[2], "raw_score": null },
                { "student_id": students[3], "raw_score": 18.5 },
            ]
        });

        // the request body must deserialize even with bad scores in it
        let input: BulkScoreInput = serde_json::from_value(body).unwrap();
        let (accepted, failed) = screen_bulk_entries(&e, &input.entries, |_| true);

        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].student_id, students[0]);
        assert_eq!(accepted[1].student_id, students[3]);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].index, 1);
        assert_eq!(failed[1].index, 2);
        assert!(failed.iter().all(|f| f.violation.field == "raw_score"));
    }

    #[test]
    fn students_outside_the_scope_are_itemized() {
        let e = evaluation(20);
        let inside = Uuid::new_v4();
        let outside = Uuid::new_v4();
        let batch = entries(&[inside, outside], &[10.0, 10.0]);

        let (accepted, failed) = screen_bulk_entries(&e, &batch, |id| id == inside);
        assert_eq!(accepted.len(), 1);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].student_id, outside);
        assert_eq!(failed[0].violation.field, "student_id");
    }

    #[test]
    fn duplicate_students_keep_the_first_entry() {
        let e = evaluation(20);
        let student = Uuid::new_v4();
        let batch = entries(&[student, student], &[8.0, 9.0]);

        let (accepted, failed) = screen_bulk_entries(&e, &batch, |_| true);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].raw_score, Decimal::from(8));
        assert_eq!(failed[0].index, 1);
    }

    #[test]
    fn conflicts_while_persisting_are_itemized_on_expected_version() {
        let err = GradingError::Conflict("version 3, expected 2".to_string());
        let failures = entry_failure(4, Uuid::new_v4(), &err);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 4);
        assert_eq!(failures[0].violation.field, "expected_version");
    }

    #[test]
    fn empty_batch_is_a_complete_no_op() {
        let e = evaluation(20);
        let (accepted, failed) = screen_bulk_entries(&e, &[], |_| true);
        assert!(accepted.is_empty());
        assert!(failed.is_empty());
    }
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    /// Recording the same value twice leaves the same state as recording it once
    #[test]
    fn prop_recording_is_idempotent(cents in 0i64..=10_000) {
        let e = evaluation(100);
        let student = Uuid::new_v4();
        let raw = cents as f64 / 100.0;

        let once = record(None, &e, student, raw, None).unwrap();
        let twice = record(Some(&once), &e, student, raw, None).unwrap();

        prop_assert_eq!(once.raw_score, twice.raw_score);
        prop_assert_eq!(once.version, twice.version);
        prop_assert_eq!(once.status, twice.status);
    }

    /// Every value in [0, max] is accepted and anything beyond is rejected
    #[test]
    fn prop_bounds_are_inclusive(max in 1i64..=500, cents in 1i64..=10_000) {
        let e = evaluation(max);
        let over = max as f64 + cents as f64 / 100.0;
        let under = -(cents as f64 / 100.0);

        prop_assert!(record(None, &e, Uuid::new_v4(), max as f64, None).is_ok());
        prop_assert!(record(None, &e, Uuid::new_v4(), over, None).is_err());
        prop_assert!(record(None, &e, Uuid::new_v4(), under, None).is_err());
    }
}
