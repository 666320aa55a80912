//! HTTP handlers for evaluation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::evaluation::EvaluationWrite;
use crate::services::{EvaluationService, ScoreService};
use crate::AppState;
use shared::{Evaluation, EvaluationDraft, EvaluationUpdate};

#[derive(Deserialize)]
pub struct EvaluationListQuery {
    pub partial_id: Uuid,
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}

fn service(state: &AppState) -> EvaluationService {
    EvaluationService::new(state.db.clone(), state.config.grading.budget_policy())
}

/// List evaluations of a partial, optionally narrowed to a class
pub async fn list_evaluations(
    State(state): State<AppState>,
    Query(query): Query<EvaluationListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let evaluations = service(&state)
        .list_by_scope(query.partial_id, query.class_id, query.include_inactive)
        .await?;
    Ok(Json(serde_json::json!({ "evaluations": evaluations })))
}

/// Create an evaluation
pub async fn create_evaluation(
    State(state): State<AppState>,
    Json(draft): Json<EvaluationDraft>,
) -> AppResult<(StatusCode, Json<EvaluationWrite>)> {
    let written = service(&state).create(draft).await?;
    Ok((StatusCode::CREATED, Json(written)))
}

/// Get an evaluation by ID
pub async fn get_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> AppResult<Json<Evaluation>> {
    let evaluation = service(&state).get(evaluation_id).await?;
    Ok(Json(evaluation))
}

/// Edit an evaluation
pub async fn update_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
    Json(update): Json<EvaluationUpdate>,
) -> AppResult<Json<EvaluationWrite>> {
    let written = service(&state).update(evaluation_id, update).await?;
    Ok(Json(written))
}

/// Deactivate an evaluation
pub async fn delete_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> AppResult<Json<Evaluation>> {
    let evaluation = service(&state).deactivate(evaluation_id).await?;
    Ok(Json(evaluation))
}

/// Scores recorded on an evaluation
pub async fn list_evaluation_scores(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let service = ScoreService::new(state.db);
    let scores = service.list_for_evaluation(evaluation_id).await?;
    Ok(Json(serde_json::json!({ "scores": scores })))
}
