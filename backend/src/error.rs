//! Error handling for the academic console grading server
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{FieldViolation, GradingError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Engine errors
    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldViolation>,
}

impl ErrorDetail {
    fn plain(code: &str, message_en: String, message_es: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_es,
            field: None,
            details: Vec::new(),
        }
    }

    fn from_violation(code: &str, violation: &FieldViolation) -> Self {
        Self {
            code: code.to_string(),
            message_en: violation.message.clone(),
            message_es: violation.message_es.clone(),
            field: Some(violation.field.clone()),
            details: Vec::new(),
        }
    }
}

impl AppError {
    /// Status code and body for this error
    fn parts(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Grading(GradingError::Validation(v)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::from_violation("VALIDATION_ERROR", v),
            ),
            AppError::Grading(GradingError::InvalidFields(violations)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: format!("{} fields are invalid", violations.len()),
                    message_es: format!("{} campos no son válidos", violations.len()),
                    field: None,
                    details: violations.clone(),
                },
            ),
            AppError::Grading(GradingError::Referential(v)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::from_violation("REFERENTIAL_ERROR", v),
            ),
            AppError::Grading(GradingError::NotFound(resource)) | AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::plain(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("No se encontró {}", resource),
                ),
            ),
            AppError::Grading(GradingError::Conflict(msg)) => (
                StatusCode::CONFLICT,
                ErrorDetail::plain(
                    "CONFLICT",
                    msg.clone(),
                    format!("Conflicto de versión: {}", msg),
                ),
            ),
            AppError::Grading(GradingError::Precondition(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::plain(
                    "PRECONDITION_FAILED",
                    format!("Precondition failed: {}", msg),
                    "Los datos de origen no cumplen el contrato esperado".to_string(),
                ),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::plain(
                    "BAD_REQUEST",
                    msg.clone(),
                    format!("Solicitud inválida: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::plain(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "Ocurrió un error en la base de datos".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::plain(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Error interno del servidor".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::plain(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Error interno del servidor".to_string(),
                ),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.parts();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
