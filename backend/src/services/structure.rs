//! Grading structure store
//!
//! One ACTIVE structure per (partial, class). Writes are full replacements;
//! deletes are logical.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::CatalogService;
use shared::{
    validate_structure_input, CategoryWeights, GradingError, GradingStructure, RecordState,
    ResolvedStructure, ScoreLimits, StructureInput,
};

/// Grading structure service
#[derive(Clone)]
pub struct StructureService {
    db: PgPool,
}

/// Database row for a grading structure
#[derive(Debug, sqlx::FromRow)]
struct StructureRow {
    partial_id: Uuid,
    class_id: Uuid,
    weight_acumulativo: Decimal,
    weight_examen: Decimal,
    weight_reposicion: Decimal,
    max_partial_score: Decimal,
    min_passing_score: Decimal,
    notes: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StructureRow> for GradingStructure {
    fn from(row: StructureRow) -> Self {
        GradingStructure {
            partial_id: row.partial_id,
            class_id: row.class_id,
            weights: CategoryWeights::new(
                row.weight_acumulativo,
                row.weight_examen,
                row.weight_reposicion,
            ),
            limits: ScoreLimits {
                max_partial_score: row.max_partial_score,
                min_passing_score: row.min_passing_score,
            },
            notes: row.notes,
            state: RecordState::from_str(&row.state).unwrap_or(RecordState::Inactive),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

const STRUCTURE_COLUMNS: &str = r#"
    partial_id, class_id, weight_acumulativo, weight_examen, weight_reposicion,
    max_partial_score, min_passing_score, notes, state, created_at, updated_at
"#;

impl StructureService {
    /// Create a new StructureService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the structure in force for a (partial, class) pair.
    ///
    /// Falls back to the implied default, flagged `is_default`, when nothing
    /// active is configured. The default is never written.
    pub async fn get(&self, partial_id: Uuid, class_id: Uuid) -> AppResult<ResolvedStructure> {
        let row = sqlx::query_as::<_, StructureRow>(&format!(
            r#"
            SELECT {}
            FROM grading_structures
            WHERE partial_id = $1 AND class_id = $2 AND state = 'ACTIVE'
            "#,
            STRUCTURE_COLUMNS
        ))
        .bind(partial_id)
        .bind(class_id)
        .fetch_optional(&self.db)
        .await?;

        let resolved = ResolvedStructure::resolve(partial_id, class_id, row.map(Into::into));
        if resolved.is_default {
            tracing::debug!(
                "No structure configured for partial {} class {}; using default",
                partial_id,
                class_id
            );
        }
        Ok(resolved)
    }

    /// Replace the structure of a (partial, class) pair, creating it if needed
    pub async fn upsert(
        &self,
        partial_id: Uuid,
        class_id: Uuid,
        input: StructureInput,
    ) -> AppResult<ResolvedStructure> {
        validate_structure_input(&input)?;

        let catalog = CatalogService::new(self.db.clone());
        if catalog.find_partial(partial_id).await?.is_none() {
            return Err(GradingError::referential(
                "partial_id",
                format!("Partial {} does not exist", partial_id),
                format!("El parcial {} no existe", partial_id),
            )
            .into());
        }
        if !catalog.class_exists(class_id).await? {
            return Err(GradingError::referential(
                "class_id",
                format!("Class {} does not exist", class_id),
                format!("La clase {} no existe", class_id),
            )
            .into());
        }

        let row = sqlx::query_as::<_, StructureRow>(&format!(
            r#"
            INSERT INTO grading_structures (
                partial_id, class_id, weight_acumulativo, weight_examen, weight_reposicion,
                max_partial_score, min_passing_score, notes, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACTIVE')
            ON CONFLICT (partial_id, class_id) WHERE state = 'ACTIVE'
            DO UPDATE SET
                weight_acumulativo = EXCLUDED.weight_acumulativo,
                weight_examen = EXCLUDED.weight_examen,
                weight_reposicion = EXCLUDED.weight_reposicion,
                max_partial_score = EXCLUDED.max_partial_score,
                min_passing_score = EXCLUDED.min_passing_score,
                notes = EXCLUDED.notes,
                updated_at = NOW()
            RETURNING {}
            "#,
            STRUCTURE_COLUMNS
        ))
        .bind(partial_id)
        .bind(class_id)
        .bind(input.weights.acumulativo)
        .bind(input.weights.examen)
        .bind(input.weights.reposicion)
        .bind(input.limits.max_partial_score)
        .bind(input.limits.min_passing_score)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            "Saved grading structure for partial {} class {} ({}/{}/{})",
            partial_id,
            class_id,
            input.weights.acumulativo,
            input.weights.examen,
            input.weights.reposicion
        );

        Ok(ResolvedStructure::resolve(partial_id, class_id, Some(row.into())))
    }

    /// Logically delete the active structure of a (partial, class) pair
    pub async fn deactivate(&self, partial_id: Uuid, class_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE grading_structures
            SET state = 'INACTIVE', updated_at = NOW()
            WHERE partial_id = $1 AND class_id = $2 AND state = 'ACTIVE'
            "#,
        )
        .bind(partial_id)
        .bind(class_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Grading structure".to_string()));
        }

        tracing::info!(
            "Deactivated grading structure for partial {} class {}",
            partial_id,
            class_id
        );
        Ok(())
    }
}
