//! Score recording rules
//!
//! The store performs the writes; this module decides what gets written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{FieldViolation, GradingError, GradingResult};
use crate::models::{Evaluation, ScoreEntry, ScoreEntryError, ScoreStatus, StudentScore};
use crate::validation::validate_raw_value;

/// Reject recording against an evaluation that is no longer active
pub fn ensure_gradable(evaluation: &Evaluation) -> GradingResult<()> {
    if evaluation.is_active() {
        Ok(())
    } else {
        Err(GradingError::referential(
            "evaluation_id",
            format!("Evaluation {} is inactive and cannot be graded", evaluation.id),
            format!("La evaluación {} está inactiva y no se puede calificar", evaluation.id),
        ))
    }
}

/// Compute the score row that results from recording `raw_score`.
///
/// Last write wins unless `expected_version` is given, in which case it must
/// match the stored version (or be 0 when nothing is stored yet). Recording
/// the value already stored keeps the version, so repeating a write is
/// idempotent.
pub fn apply_score(
    existing: Option<&StudentScore>,
    evaluation_id: Uuid,
    student_id: Uuid,
    raw_score: Decimal,
    expected_version: Option<i32>,
    now: DateTime<Utc>,
) -> GradingResult<StudentScore> {
    let current_version = existing.map(|s| s.version).unwrap_or(0);

    if let Some(expected) = expected_version {
        if expected != current_version {
            return Err(GradingError::Conflict(format!(
                "score for student {} on evaluation {} is at version {}, expected {}",
                student_id, evaluation_id, current_version, expected
            )));
        }
    }

    let version = match existing {
        Some(s) if s.is_graded() && s.raw_score == raw_score => s.version,
        Some(s) => s.version + 1,
        None => 1,
    };

    Ok(StudentScore {
        evaluation_id,
        student_id,
        raw_score,
        status: ScoreStatus::Graded,
        recorded_at: now,
        version,
    })
}

/// A bulk entry that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedEntry {
    pub index: usize,
    pub student_id: Uuid,
    pub raw_score: Decimal,
    pub expected_version: Option<i32>,
}

/// Validate every entry of a batch before anything is written.
///
/// Entries are judged independently: one bad entry never affects the others.
/// `is_enrolled` tells whether a student may be graded on this evaluation.
/// A student appearing more than once keeps only the first entry; later ones
/// are reported as failures.
pub fn screen_bulk_entries<F>(
    evaluation: &Evaluation,
    entries: &[ScoreEntry],
    is_enrolled: F,
) -> (Vec<AcceptedEntry>, Vec<ScoreEntryError>)
where
    F: Fn(Uuid) -> bool,
{
    let mut accepted = Vec::with_capacity(entries.len());
    let mut failed = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        if !seen.insert(entry.student_id) {
            failed.push(ScoreEntryError {
                student_id: entry.student_id,
                index,
                violation: FieldViolation::new(
                    "student_id",
                    "Student appears more than once in this batch",
                    "El estudiante aparece más de una vez en el lote",
                ),
            });
            continue;
        }

        if !is_enrolled(entry.student_id) {
            failed.push(ScoreEntryError {
                student_id: entry.student_id,
                index,
                violation: not_enrolled(entry.student_id, evaluation.id),
            });
            continue;
        }

        match validate_raw_value(&entry.raw_score, evaluation.max_points) {
            Ok(raw_score) => accepted.push(AcceptedEntry {
                index,
                student_id: entry.student_id,
                raw_score,
                expected_version: entry.expected_version,
            }),
            Err(err) => failed.extend(err.violations().into_iter().map(|violation| {
                ScoreEntryError {
                    student_id: entry.student_id,
                    index,
                    violation,
                }
            })),
        }
    }

    (accepted, failed)
}

/// Violation raised when grading a student outside the evaluation's scope
pub fn not_enrolled(student_id: Uuid, evaluation_id: Uuid) -> FieldViolation {
    FieldViolation::new(
        "student_id",
        format!(
            "Student {} is not enrolled in the scope of evaluation {}",
            student_id, evaluation_id
        ),
        format!(
            "El estudiante {} no está inscrito en el ámbito de la evaluación {}",
            student_id, evaluation_id
        ),
    )
}

/// Turn a per-entry error into an itemized bulk failure
pub fn entry_failure(index: usize, student_id: Uuid, err: &GradingError) -> Vec<ScoreEntryError> {
    let violations = match err {
        GradingError::Conflict(msg) => vec![FieldViolation::new(
            "expected_version",
            msg.clone(),
            format!("Conflicto de versión: {}", msg),
        )],
        other => {
            let v = other.violations();
            if v.is_empty() {
                vec![FieldViolation::new(
                    "raw_score",
                    other.to_string(),
                    "No se pudo registrar la nota",
                )]
            } else {
                v
            }
        }
    };

    violations
        .into_iter()
        .map(|violation| ScoreEntryError {
            student_id,
            index,
            violation,
        })
        .collect()
}
