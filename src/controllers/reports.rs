use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::reports;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports/capacity", get(capacity_report))
        .route("/reports/revenue", get(revenue_report))
}

// GET /api/reports/capacity (admin)
async fn capacity_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let rows = reports::capacity(&state.db.pool).await?;
    Ok(Json(rows))
}

// GET /api/reports/revenue (admin)
async fn revenue_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let rows = reports::revenue(&state.db.pool).await?;
    Ok(Json(rows))
}
