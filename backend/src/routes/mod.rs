//! Route definitions for the grading engine API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/structures", structure_routes())
        .nest("/evaluations", evaluation_routes())
        .nest("/scores", score_routes())
        .nest("/reports", report_routes())
        .route(
            "/results/:partial_id/:class_id/:student_id",
            get(handlers::get_partial_result),
        )
}

/// Grading structure routes
fn structure_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:partial_id/:class_id",
            get(handlers::get_structure)
                .put(handlers::put_structure)
                .delete(handlers::delete_structure),
        )
        .route("/:partial_id/:class_id/budget", get(handlers::get_budget))
}

/// Evaluation catalog routes
fn evaluation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_evaluations).post(handlers::create_evaluation),
        )
        .route(
            "/:evaluation_id",
            get(handlers::get_evaluation)
                .put(handlers::update_evaluation)
                .delete(handlers::delete_evaluation),
        )
        .route(
            "/:evaluation_id/scores",
            get(handlers::list_evaluation_scores),
        )
}

/// Score recording routes
fn score_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::record_score))
        .route("/bulk", post(handlers::record_scores_bulk))
}

/// Report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/student/:student_id", get(handlers::get_student_report))
        .route("/class/:class_id", get(handlers::get_class_report))
        .route("/partial/:partial_id", get(handlers::get_partial_report))
}
