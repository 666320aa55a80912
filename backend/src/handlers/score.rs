//! HTTP handlers for score recording endpoints

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::ScoreService;
use crate::AppState;
use shared::{BulkScoreInput, BulkScoreOutcome, RecordScoreInput, StudentScore};

/// Record one score
pub async fn record_score(
    State(state): State<AppState>,
    Json(input): Json<RecordScoreInput>,
) -> AppResult<Json<StudentScore>> {
    let service = ScoreService::new(state.db);
    let score = service.record(input).await?;
    Ok(Json(score))
}

/// Record many scores on one evaluation; failed entries are itemized
pub async fn record_scores_bulk(
    State(state): State<AppState>,
    Json(input): Json<BulkScoreInput>,
) -> AppResult<Json<BulkScoreOutcome>> {
    let service = ScoreService::new(state.db);
    let outcome = service.record_many(input).await?;
    Ok(Json(outcome))
}
