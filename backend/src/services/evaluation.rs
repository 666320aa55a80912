//! Evaluation catalog service
//!
//! Creates, edits and lists evaluations and checks every write against the
//! category budget of the grading structure in force.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{CatalogService, StructureService};
use shared::{
    admit_in_views, summarize_budget, validate_evaluation, BudgetPolicy, BudgetSummary,
    BudgetView, Category, Evaluation, EvaluationDraft, EvaluationScope, EvaluationUpdate, RecordState,
};

/// Evaluation catalog service
#[derive(Clone)]
pub struct EvaluationService {
    db: PgPool,
    policy: BudgetPolicy,
}

/// Database row for an evaluation
#[derive(Debug, sqlx::FromRow)]
struct EvaluationRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    category: String,
    max_points: Decimal,
    partial_id: Uuid,
    period_id: Uuid,
    class_id: Option<Uuid>,
    section_id: Option<Uuid>,
    starts_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
    weight: Decimal,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EvaluationRow> for Evaluation {
    type Error = AppError;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        let category = Category::from_str(&row.category).ok_or_else(|| {
            AppError::Internal(format!(
                "Evaluation {} has unknown category {}",
                row.id, row.category
            ))
        })?;

        Ok(Evaluation {
            id: row.id,
            title: row.title,
            description: row.description,
            category,
            max_points: row.max_points,
            scope: EvaluationScope {
                partial_id: row.partial_id,
                period_id: row.period_id,
                class_id: row.class_id,
                section_id: row.section_id,
            },
            starts_at: row.starts_at,
            closes_at: row.closes_at,
            weight: row.weight,
            state: RecordState::from_str(&row.state).unwrap_or(RecordState::Inactive),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Result of creating or editing an evaluation
#[derive(Debug, Serialize)]
pub struct EvaluationWrite {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    /// Budget of the evaluation's class after the write; absent for
    /// partial-wide evaluations
    pub budget: Option<BudgetSummary>,
}

const EVALUATION_COLUMNS: &str = r#"
    id, title, description, category, max_points, partial_id, period_id, class_id,
    section_id, starts_at, closes_at, weight, state, created_at, updated_at
"#;

fn into_evaluations(rows: Vec<EvaluationRow>) -> AppResult<Vec<Evaluation>> {
    rows.into_iter().map(Evaluation::try_from).collect()
}

impl EvaluationService {
    /// Create a new EvaluationService instance
    pub fn new(db: PgPool, policy: BudgetPolicy) -> Self {
        Self { db, policy }
    }

    /// Create an evaluation
    pub async fn create(&self, draft: EvaluationDraft) -> AppResult<EvaluationWrite> {
        let catalog = CatalogService::new(self.db.clone());
        let partial = catalog.find_partial(draft.scope.partial_id).await?;
        validate_evaluation(&draft, partial.as_ref())?;

        let evaluation = Evaluation::from_draft(Uuid::new_v4(), draft, Utc::now());
        let budget = self.check_budget(&evaluation).await?;

        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            r#"
            INSERT INTO evaluations (
                id, title, description, category, max_points, partial_id, period_id, class_id,
                section_id, starts_at, closes_at, weight, state, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(evaluation.id)
        .bind(&evaluation.title)
        .bind(&evaluation.description)
        .bind(evaluation.category.as_str())
        .bind(evaluation.max_points)
        .bind(evaluation.scope.partial_id)
        .bind(evaluation.scope.period_id)
        .bind(evaluation.scope.class_id)
        .bind(evaluation.scope.section_id)
        .bind(evaluation.starts_at)
        .bind(evaluation.closes_at)
        .bind(evaluation.weight)
        .bind(evaluation.state.as_str())
        .bind(evaluation.created_at)
        .bind(evaluation.updated_at)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            "Created {} evaluation {} ({} points) in partial {}",
            evaluation.category,
            evaluation.id,
            evaluation.max_points,
            evaluation.scope.partial_id
        );

        Ok(EvaluationWrite {
            evaluation: row.try_into()?,
            budget,
        })
    }

    /// Edit an evaluation. The category can be restated but never changed.
    pub async fn update(
        &self,
        evaluation_id: Uuid,
        update: EvaluationUpdate,
    ) -> AppResult<EvaluationWrite> {
        let current = self.get(evaluation_id).await?;

        let catalog = CatalogService::new(self.db.clone());
        let partial = catalog.find_partial(update.scope.partial_id).await?;
        validate_evaluation(&update, partial.as_ref())?;

        let evaluation = current.apply_update(update, Utc::now())?;
        let budget = if evaluation.is_active() {
            self.check_budget(&evaluation).await?
        } else {
            None
        };

        // category is locked at creation
        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            r#"
            UPDATE evaluations
            SET title = $1, description = $2, max_points = $3, partial_id = $4, period_id = $5,
                class_id = $6, section_id = $7, starts_at = $8, closes_at = $9, updated_at = $10
            WHERE id = $11
            RETURNING {}
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(&evaluation.title)
        .bind(&evaluation.description)
        .bind(evaluation.max_points)
        .bind(evaluation.scope.partial_id)
        .bind(evaluation.scope.period_id)
        .bind(evaluation.scope.class_id)
        .bind(evaluation.scope.section_id)
        .bind(evaluation.starts_at)
        .bind(evaluation.closes_at)
        .bind(evaluation.updated_at)
        .bind(evaluation_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Updated evaluation {}", evaluation_id);

        Ok(EvaluationWrite {
            evaluation: row.try_into()?,
            budget,
        })
    }

    /// Get an evaluation by ID
    pub async fn get(&self, evaluation_id: Uuid) -> AppResult<Evaluation> {
        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            "SELECT {} FROM evaluations WHERE id = $1",
            EVALUATION_COLUMNS
        ))
        .bind(evaluation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Evaluation".to_string()))?;

        row.try_into()
    }

    /// List the evaluations of a partial.
    ///
    /// With a class, returns that class's evaluations plus the partial-wide
    /// ones. Inactive evaluations are only included on request.
    pub async fn list_by_scope(
        &self,
        partial_id: Uuid,
        class_id: Option<Uuid>,
        include_inactive: bool,
    ) -> AppResult<Vec<Evaluation>> {
        let rows = sqlx::query_as::<_, EvaluationRow>(&format!(
            r#"
            SELECT {}
            FROM evaluations
            WHERE partial_id = $1
              AND ($2::uuid IS NULL OR class_id IS NULL OR class_id = $2)
              AND ($3 OR state = 'ACTIVE')
            ORDER BY starts_at ASC, title ASC
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(partial_id)
        .bind(class_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        into_evaluations(rows)
    }

    /// Active evaluations of every partial in `partial_ids` that apply to a class
    pub async fn list_for_partials(
        &self,
        partial_ids: &[Uuid],
        class_id: Uuid,
    ) -> AppResult<Vec<Evaluation>> {
        let rows = sqlx::query_as::<_, EvaluationRow>(&format!(
            r#"
            SELECT {}
            FROM evaluations
            WHERE partial_id = ANY($1)
              AND (class_id IS NULL OR class_id = $2)
              AND state = 'ACTIVE'
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(partial_ids)
        .bind(class_id)
        .fetch_all(&self.db)
        .await?;

        into_evaluations(rows)
    }

    /// Logically delete an evaluation. Its scores are kept.
    pub async fn deactivate(&self, evaluation_id: Uuid) -> AppResult<Evaluation> {
        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            r#"
            UPDATE evaluations
            SET state = 'INACTIVE', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(evaluation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Evaluation".to_string()))?;

        tracing::info!("Deactivated evaluation {}", evaluation_id);
        row.try_into()
    }

    /// Category budget of a (partial, class[, section]) view
    pub async fn budget(
        &self,
        partial_id: Uuid,
        class_id: Uuid,
        section_id: Option<Uuid>,
    ) -> AppResult<BudgetSummary> {
        let structure = StructureService::new(self.db.clone())
            .get(partial_id, class_id)
            .await?;
        let evaluations = self.list_by_scope(partial_id, Some(class_id), false).await?;

        Ok(summarize_budget(&structure, &evaluations, section_id))
    }

    /// Check a pending write against the budgets it counts in.
    ///
    /// Returns the budget of the evaluation's own view for the response,
    /// `None` for partial-wide evaluations. Under the strict policy every
    /// class the evaluation reaches, and every section of those classes, must
    /// admit it.
    async fn check_budget(&self, evaluation: &Evaluation) -> AppResult<Option<BudgetSummary>> {
        let scope = &evaluation.scope;
        let catalog = CatalogService::new(self.db.clone());
        let structures = StructureService::new(self.db.clone());

        let class_ids = match scope.class_id {
            Some(class_id) => vec![class_id],
            None => catalog.classes_for_partial(scope.period_id, scope.partial_id).await?,
        };

        let mut resolved = Vec::with_capacity(class_ids.len());
        let mut sections = Vec::with_capacity(class_ids.len());
        for &class_id in &class_ids {
            resolved.push(structures.get(scope.partial_id, class_id).await?);
            sections.push(if self.policy == BudgetPolicy::Strict {
                catalog.class_sections(class_id).await?
            } else {
                Vec::new()
            });
        }

        let mut views = Vec::new();
        for (structure, class_sections) in resolved.iter().zip(&sections) {
            views.push(BudgetView { structure, section_id: scope.section_id });
            if scope.section_id.is_none() {
                views.extend(class_sections.iter().map(|&section_id| BudgetView {
                    structure,
                    section_id: Some(section_id),
                }));
            }
        }

        let existing = self.list_by_scope(scope.partial_id, None, false).await?;
        let summaries = admit_in_views(&views, &existing, evaluation, self.policy)?;

        for summary in summaries.iter().filter(|s| s.any_exceeded()) {
            tracing::warn!(
                "Evaluation {} leaves a category of partial {} class {} over budget",
                evaluation.id,
                summary.partial_id,
                summary.class_id
            );
        }

        // the evaluation's own view is checked first
        Ok(match scope.class_id {
            Some(_) => summaries.into_iter().next(),
            None => None,
        })
    }
}
