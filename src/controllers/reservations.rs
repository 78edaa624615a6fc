use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::ledger::{self, BookingRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(create_reservation).get(list_reservations))
        .route("/reservations/{id}", get(get_reservation))
        .route("/reservations/{id}/cancel", post(cancel_reservation))
}

/* ---------- RESERVATIONS ---------- */

#[derive(Debug, Deserialize, Serialize)]
struct ReservationItemRequest {
    seat_id: i64,
}

// POST /api/reservations
#[derive(Debug, Deserialize, Validate)]
struct CreateReservationRequest {
    showtime_id: i64,
    #[validate(length(min = 1, message = "reservation must contain at least one seat"))]
    items: Vec<ReservationItemRequest>,
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let booking = BookingRequest {
        showtime_id: req.showtime_id,
        seat_ids: req.items.iter().map(|i| i.seat_id).collect(),
    };

    let view = ledger::create_reservation(&state.db.pool, &user, &booking, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

// GET /api/reservations
async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let views = ledger::list_reservations(&state.db.pool, &user).await?;
    Ok(Json(views))
}

// GET /api/reservations/{id}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let view = ledger::get_reservation(&state.db.pool, &user, id).await?;
    Ok(Json(view))
}

// POST /api/reservations/{id}/cancel
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    ledger::cancel_reservation(&state.db.pool, &user, id).await?;
    Ok(Json(serde_json::json!({ "message": "reservation cancelled" })))
}
