use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by all core operations. Every seat-mutating
/// operation runs in a transaction, so any of these surfacing from inside
/// one means the whole operation rolled back.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Exclusivity invariant hit: the named seats already carry a live claim
    /// for this show. Clients should re-fetch availability and reselect.
    #[error("seats already booked: {}", .0.join(", "))]
    SeatConflict(Vec<String>),

    #[error("requested {requested} seats, at most {max} allowed per booking")]
    LimitExceeded { requested: usize, max: usize },

    #[error("{0}")]
    CutoffExceeded(String),

    #[error("{0}")]
    Authorization(String),

    #[error("storage error")]
    Persistence(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": msg }),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": format!("{what} not found") }),
            ),
            AppError::SeatConflict(seats) => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "message": self.to_string(),
                    "conflicting_seats": seats,
                }),
            ),
            AppError::LimitExceeded { .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": self.to_string() }),
            ),
            AppError::CutoffExceeded(msg) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "message": msg }),
            ),
            AppError::Authorization(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "success": false, "message": msg }),
            ),
            AppError::Persistence(e) => {
                tracing::error!("database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// True when a sqlx error is a Postgres unique violation (code 23505).
/// The reservation transaction uses this to convert a race on the live-claim
/// index into a `SeatConflict`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_conflict_names_seats() {
        let err = AppError::SeatConflict(vec!["A1".into(), "A2".into()]);
        assert_eq!(err.to_string(), "seats already booked: A1, A2");
    }

    #[test]
    fn limit_message_includes_both_numbers() {
        let err = AppError::LimitExceeded { requested: 9, max: 7 };
        let msg = err.to_string();
        assert!(msg.contains('9') && msg.contains('7'));
    }
}
