use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::Showtime;
use crate::services::availability;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", get(list_showtimes).post(create_showtime))
        .route("/showtimes/{id}", get(get_showtime))
        .route("/showtimes/{id}/availability", get(get_availability))
}

async fn exists(pool: &sqlx::PgPool, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)"))
        .bind(id)
        .fetch_one(pool)
        .await
}

/* ---------- SHOWTIMES ---------- */

// POST /api/showtimes (admin)
#[derive(Debug, Deserialize, Validate)]
struct CreateShowtimeRequest {
    movie_id: i64,
    auditorium_id: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    #[validate(range(min = 0, message = "price_cents must be non-negative"))]
    price_cents: i64,
}

async fn create_showtime(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    if req.starts_at >= req.ends_at {
        return Err(ApiError::InvalidRequest(
            "starts_at must be before ends_at".to_string(),
        ));
    }
    if !exists(&state.db.pool, "movies", req.movie_id).await? {
        return Err(ApiError::NotFound("movie"));
    }
    if !exists(&state.db.pool, "auditoriums", req.auditorium_id).await? {
        return Err(ApiError::NotFound("auditorium"));
    }

    // Overlapping showtimes in the same auditorium are not rejected.
    let showtime: Showtime = sqlx::query_as(
        "INSERT INTO showtimes (movie_id, auditorium_id, starts_at, ends_at, price_cents)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(req.movie_id)
    .bind(req.auditorium_id)
    .bind(req.starts_at)
    .bind(req.ends_at)
    .bind(req.price_cents)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(showtime)))
}

// GET /api/showtimes
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let showtimes: Vec<Showtime> =
        sqlx::query_as("SELECT * FROM showtimes ORDER BY starts_at, id")
            .fetch_all(&state.db.pool)
            .await?;
    Ok(Json(showtimes))
}

// GET /api/showtimes/{id}
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let showtime: Option<Showtime> = sqlx::query_as("SELECT * FROM showtimes WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?;
    let showtime = showtime.ok_or(ApiError::NotFound("showtime"))?;
    Ok(Json(showtime))
}

// GET /api/showtimes/{id}/availability
async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let seats = availability::for_showtime(&state.db.pool, id).await?;
    Ok(Json(seats))
}
