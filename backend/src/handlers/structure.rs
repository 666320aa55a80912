//! HTTP handlers for grading structure endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::{EvaluationService, StructureService};
use crate::AppState;
use shared::{BudgetSummary, ResolvedStructure, StructureInput};

#[derive(Deserialize)]
pub struct BudgetQuery {
    pub section_id: Option<Uuid>,
}

/// Get the structure of a (partial, class) pair, or the flagged default
pub async fn get_structure(
    State(state): State<AppState>,
    Path((partial_id, class_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ResolvedStructure>> {
    let service = StructureService::new(state.db);
    let structure = service.get(partial_id, class_id).await?;
    Ok(Json(structure))
}

/// Replace the structure of a (partial, class) pair
pub async fn put_structure(
    State(state): State<AppState>,
    Path((partial_id, class_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<StructureInput>,
) -> AppResult<Json<ResolvedStructure>> {
    let service = StructureService::new(state.db);
    let structure = service.upsert(partial_id, class_id, input).await?;
    Ok(Json(structure))
}

/// Deactivate the structure of a (partial, class) pair
pub async fn delete_structure(
    State(state): State<AppState>,
    Path((partial_id, class_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let service = StructureService::new(state.db);
    service.deactivate(partial_id, class_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Category budget of a (partial, class) pair, optionally for one section
pub async fn get_budget(
    State(state): State<AppState>,
    Path((partial_id, class_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<BudgetQuery>,
) -> AppResult<Json<BudgetSummary>> {
    let service = EvaluationService::new(state.db, state.config.grading.budget_policy());
    let budget = service.budget(partial_id, class_id, query.section_id).await?;
    Ok(Json(budget))
}
