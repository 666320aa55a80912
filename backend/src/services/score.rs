//! Score recording service
//!
//! Each (evaluation, student) score is written in its own transaction. Bulk
//! recordings validate every entry first and then persist the valid ones one
//! by one, so a failing entry never rolls back another.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{CatalogService, EvaluationService};
use shared::{
    apply_score, ensure_gradable, entry_failure, not_enrolled, screen_bulk_entries,
    validate_raw_value, BudgetPolicy, BulkScoreInput, BulkScoreOutcome, Evaluation,
    FieldViolation, GradingError, RecordScoreInput, ScoreEntryError, ScoreStatus, StudentScore,
};

/// Score recording service
#[derive(Clone)]
pub struct ScoreService {
    db: PgPool,
}

/// Database row for a student score
#[derive(Debug, sqlx::FromRow)]
struct ScoreRow {
    evaluation_id: Uuid,
    student_id: Uuid,
    raw_score: Decimal,
    status: String,
    recorded_at: DateTime<Utc>,
    version: i32,
}

impl From<ScoreRow> for StudentScore {
    fn from(row: ScoreRow) -> Self {
        StudentScore {
            evaluation_id: row.evaluation_id,
            student_id: row.student_id,
            raw_score: row.raw_score,
            status: ScoreStatus::from_str(&row.status).unwrap_or_default(),
            recorded_at: row.recorded_at,
            version: row.version,
        }
    }
}

impl ScoreService {
    /// Create a new ScoreService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record one student's score on one evaluation
    pub async fn record(&self, input: RecordScoreInput) -> AppResult<StudentScore> {
        let evaluation = self.gradable_evaluation(input.evaluation_id).await?;
        let raw_score = validate_raw_value(&input.raw_score, evaluation.max_points)?;

        let catalog = CatalogService::new(self.db.clone());
        if !catalog
            .student_in_scope(&evaluation.scope, input.student_id)
            .await?
        {
            return Err(
                GradingError::Referential(not_enrolled(input.student_id, evaluation.id)).into(),
            );
        }

        let score = self
            .persist(
                evaluation.id,
                input.student_id,
                raw_score,
                input.expected_version,
            )
            .await?;

        tracing::info!(
            "Recorded {} for student {} on evaluation {} (version {})",
            score.raw_score,
            score.student_id,
            score.evaluation_id,
            score.version
        );
        Ok(score)
    }

    /// Record many scores on one evaluation with partial success
    pub async fn record_many(&self, input: BulkScoreInput) -> AppResult<BulkScoreOutcome> {
        let evaluation = self.gradable_evaluation(input.evaluation_id).await?;

        let catalog = CatalogService::new(self.db.clone());
        let enrolled = catalog.students_in_scope(&evaluation.scope).await?;

        let (accepted, mut failed) =
            screen_bulk_entries(&evaluation, &input.entries, |id| enrolled.contains(&id));

        let mut recorded = Vec::with_capacity(accepted.len());
        for entry in accepted {
            match self
                .persist(
                    evaluation.id,
                    entry.student_id,
                    entry.raw_score,
                    entry.expected_version,
                )
                .await
            {
                Ok(score) => recorded.push(score),
                Err(AppError::Grading(err)) => {
                    failed.extend(entry_failure(entry.index, entry.student_id, &err))
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to store score for student {} on evaluation {}: {:?}",
                        entry.student_id,
                        evaluation.id,
                        err
                    );
                    failed.push(ScoreEntryError {
                        student_id: entry.student_id,
                        index: entry.index,
                        violation: FieldViolation::new(
                            "raw_score",
                            "The score could not be stored",
                            "No se pudo guardar la nota",
                        ),
                    });
                }
            }
        }

        failed.sort_by_key(|f| f.index);

        if failed.is_empty() {
            tracing::info!(
                "Recorded {} scores on evaluation {}",
                recorded.len(),
                evaluation.id
            );
        } else {
            tracing::warn!(
                "Recorded {} scores on evaluation {}, rejected {} entries",
                recorded.len(),
                evaluation.id,
                failed.len()
            );
        }

        Ok(BulkScoreOutcome { recorded, failed })
    }

    /// Scores recorded on one evaluation
    pub async fn list_for_evaluation(&self, evaluation_id: Uuid) -> AppResult<Vec<StudentScore>> {
        // 404 for an unknown evaluation rather than an empty list
        self.evaluations().get(evaluation_id).await?;

        self.scores_for(&[evaluation_id], None).await
    }

    /// Scores on any of `evaluation_ids`, optionally narrowed to one student
    pub async fn scores_for(
        &self,
        evaluation_ids: &[Uuid],
        student_id: Option<Uuid>,
    ) -> AppResult<Vec<StudentScore>> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT evaluation_id, student_id, raw_score, status, recorded_at, version
            FROM student_scores
            WHERE evaluation_id = ANY($1) AND ($2::uuid IS NULL OR student_id = $2)
            ORDER BY evaluation_id, student_id
            "#,
        )
        .bind(evaluation_ids)
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn evaluations(&self) -> EvaluationService {
        // read-only use; the policy only matters for writes
        EvaluationService::new(self.db.clone(), BudgetPolicy::default())
    }

    async fn gradable_evaluation(&self, evaluation_id: Uuid) -> AppResult<Evaluation> {
        let evaluation = self.evaluations().get(evaluation_id).await?;
        ensure_gradable(&evaluation)?;
        Ok(evaluation)
    }

    /// Write one score under a row lock, honouring `expected_version`
    async fn persist(
        &self,
        evaluation_id: Uuid,
        student_id: Uuid,
        raw_score: Decimal,
        expected_version: Option<i32>,
    ) -> AppResult<StudentScore> {
        let mut tx = self.db.begin().await?;

        let existing: Option<StudentScore> = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT evaluation_id, student_id, raw_score, status, recorded_at, version
            FROM student_scores
            WHERE evaluation_id = $1 AND student_id = $2
            FOR UPDATE
            "#,
        )
        .bind(evaluation_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Into::into);

        let next = apply_score(
            existing.as_ref(),
            evaluation_id,
            student_id,
            raw_score,
            expected_version,
            Utc::now(),
        )?;
        let guard = upsert_version_guard(existing.as_ref(), expected_version);

        // With a guard, no row back means another writer got there first
        let row = sqlx::query_as::<_, ScoreRow>(
            r#"
            INSERT INTO student_scores (evaluation_id, student_id, raw_score, status, recorded_at, version)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (evaluation_id, student_id) DO UPDATE SET
                raw_score = EXCLUDED.raw_score,
                status = EXCLUDED.status,
                recorded_at = EXCLUDED.recorded_at,
                version = CASE
                    WHEN student_scores.raw_score = EXCLUDED.raw_score
                         AND student_scores.status = EXCLUDED.status
                    THEN student_scores.version
                    ELSE student_scores.version + 1
                END
            WHERE $7::int IS NULL OR student_scores.version = $7
            RETURNING evaluation_id, student_id, raw_score, status, recorded_at, version
            "#,
        )
        .bind(next.evaluation_id)
        .bind(next.student_id)
        .bind(next.raw_score)
        .bind(next.status.as_str())
        .bind(next.recorded_at)
        .bind(next.version)
        .bind(guard)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            GradingError::Conflict(format!(
                "score for student {} on evaluation {} changed concurrently",
                student_id, evaluation_id
            ))
        })?;

        tx.commit().await?;

        Ok(row.into())
    }
}

/// Version the stored row must still have for an upsert to apply.
///
/// Only a caller that sent `expected_version` asks for a guard. Without one
/// the write is last-write-wins, even against a row inserted concurrently
/// after the locking read found nothing.
fn upsert_version_guard(existing: Option<&StudentScore>, expected_version: Option<i32>) -> Option<i32> {
    expected_version.map(|_| existing.map(|s| s.version).unwrap_or(0))
}
