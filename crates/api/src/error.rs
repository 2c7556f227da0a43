use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use capplan_core::error::CoreError;
use capplan_core::types::DbId;

/// Error type returned by every planning handler.
///
/// Domain errors come from `capplan_core`; storage errors from sqlx are
/// classified by Postgres error code so integrity violations surface with
/// the same codes as the checks the core performs itself.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::Core(CoreError::NotFound { entity, id })
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Database(err) => classify_sqlx_error(err),
        };
        (status, axum::Json(ErrorBody { error, code })).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Structural(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "STRUCTURAL_ERROR",
            msg.clone(),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal planning error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

/// Classify a sqlx error by Postgres SQLSTATE.
///
/// - `RowNotFound` -> 404.
/// - `23505` on a `uq_*` constraint -> 409.
/// - `23514` on a `ck_*` constraint -> 422, the plan data would break an
///   integrity rule of the scenario hierarchy or the overlay tables.
/// - `40001` / `40P01` -> 409, the request lost a race with a concurrent
///   write to the same scenario and may be retried.
/// - Everything else -> 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    let db_err = match err {
        sqlx::Error::RowNotFound => {
            return (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            )
        }
        sqlx::Error::Database(db_err) => db_err,
        other => {
            tracing::error!(error = %other, "Database error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            );
        }
    };

    let constraint = db_err.constraint().unwrap_or_default();
    match db_err.code().as_deref() {
        Some("23505") if constraint.starts_with("uq_") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            unique_violation_message(constraint),
        ),
        Some("23514") if constraint.starts_with("ck_") => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "STRUCTURAL_ERROR",
            format!("Write violates integrity rule {constraint}"),
        ),
        Some("40001") | Some("40P01") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "The scenario was changed concurrently; retry the request".to_string(),
        ),
        _ => {
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

fn unique_violation_message(constraint: &str) -> String {
    match constraint {
        "uq_scenarios_single_baseline" => "A baseline scenario already exists".to_string(),
        "uq_merge_conflicts_entity" => {
            "The merge attempt already has a conflict for this entity".to_string()
        }
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}
