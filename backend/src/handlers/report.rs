//! Report handlers with optional CSV export

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::report::StudentPeriodCsvRow;
use crate::services::ReportService;
use crate::AppState;
use shared::PartialResult;

#[derive(Deserialize)]
pub struct PeriodReportQuery {
    pub period_id: Uuid,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Deserialize)]
pub struct PartialReportQuery {
    pub class_id: Uuid,
    pub format: Option<String>,
}

fn wants_csv(format: &Option<String>) -> AppResult<bool> {
    match format.as_deref() {
        None | Some("json") => Ok(false),
        Some("csv") => Ok(true),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unsupported report format '{}', expected json or csv",
            other
        ))),
    }
}

fn csv_response<T: Serialize>(rows: &[T], filename: &str) -> AppResult<Response> {
    let csv = ReportService::export_to_csv(rows)?;
    let disposition = format!("attachment; filename=\"{}\"", filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// One student's classes across a period
pub async fn get_student_report(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<PeriodReportQuery>,
) -> AppResult<Response> {
    let service = ReportService::new(state.db);
    let report = service
        .student_period_report(student_id, query.period_id)
        .await?;

    if wants_csv(&query.format)? {
        csv_response(
            &StudentPeriodCsvRow::from_report(&report),
            "student_period_report.csv",
        )
    } else {
        Ok(Json(report).into_response())
    }
}

/// A class across the partials of a period
pub async fn get_class_report(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
    Query(query): Query<PeriodReportQuery>,
) -> AppResult<Response> {
    let service = ReportService::new(state.db);
    let report = service.class_period_report(class_id, query.period_id).await?;

    if wants_csv(&query.format)? {
        csv_response(&report.students, "class_period_report.csv")
    } else {
        Ok(Json(report).into_response())
    }
}

/// Every student of a class for one partial
pub async fn get_partial_report(
    State(state): State<AppState>,
    Path(partial_id): Path<Uuid>,
    Query(query): Query<PartialReportQuery>,
) -> AppResult<Response> {
    let service = ReportService::new(state.db);
    let report = service
        .partial_class_report(partial_id, query.class_id)
        .await?;

    if wants_csv(&query.format)? {
        csv_response(&report.rows, "partial_class_report.csv")
    } else {
        Ok(Json(report).into_response())
    }
}

/// One student's result for a partial of a class
pub async fn get_partial_result(
    State(state): State<AppState>,
    Path((partial_id, class_id, student_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<PartialResult>> {
    let service = ReportService::new(state.db);
    let result = service
        .partial_result(student_id, partial_id, class_id)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_format_defaults_to_json() {
        assert!(!wants_csv(&None).unwrap());
        assert!(!wants_csv(&Some("json".to_string())).unwrap());
        assert!(wants_csv(&Some("csv".to_string())).unwrap());
    }

    #[test]
    fn unknown_report_format_is_a_bad_request() {
        assert!(matches!(
            wants_csv(&Some("xlsx".to_string())),
            Err(AppError::BadRequest(_))
        ));
    }
}
