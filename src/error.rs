use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy surfaced by the reservation core. Every variant maps to a
/// structured `{error, message}` response; storage faults never leak their
/// internals to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("one or more seats are no longer available")]
    SeatUnavailable,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("you do not have permission to access this resource")]
    Forbidden,

    #[error("authentication required")]
    Unauthorized,

    #[error("reservation is already cancelled")]
    AlreadyCancelled,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Name of the partial unique index that enforces "at most one active item
/// per (showtime, seat)". Violations of it mean a concurrent booking won.
pub const ACTIVE_SEAT_CONSTRAINT: &str = "uq_active_seat_per_showtime";

pub fn is_seat_conflict(err: &sqlx::Error) -> bool {
    match err.as_database_error() {
        Some(db) => db.is_unique_violation() && db.constraint() == Some(ACTIVE_SEAT_CONSTRAINT),
        None => false,
    }
}

impl ApiError {
    /// Translates an insert failure inside the booking transaction. A unique
    /// violation on the active-seat index is the lost race, everything else
    /// is a storage fault.
    pub fn from_booking_insert(err: sqlx::Error) -> Self {
        if is_seat_conflict(&err) {
            ApiError::SeatUnavailable
        } else {
            ApiError::Database(err)
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SeatUnavailable => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::AlreadyCancelled => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::SeatUnavailable => "seat_unavailable",
            ApiError::NotFound(_) => "not_found",
            ApiError::Forbidden => "forbidden",
            ApiError::Unauthorized => "unauthorized",
            ApiError::AlreadyCancelled => "already_cancelled",
            ApiError::Database(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(ref e) = self {
            tracing::error!("database error: {:?}", e);
        }
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
