use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::models::Role;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/register", post(register))
}

// POST /api/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    username: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    id: i64,
    username: String,
    role: Role,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|_| ApiError::InvalidRequest("could not hash password".to_string()))?;

    let result = sqlx::query_as::<_, (i64, Role)>(
        "INSERT INTO users (username, email, password_hash)
         VALUES ($1, $2, $3)
         RETURNING id, role",
    )
    .bind(&req.username)
    .bind(&req.email)
    .bind(&password_hash)
    .fetch_one(&state.db.pool)
    .await;

    match result {
        Ok((id, role)) => Ok((
            StatusCode::CREATED,
            Json(RegisterResponse {
                id,
                username: req.username,
                role,
            }),
        )),
        Err(e) => match e.as_database_error() {
            Some(db) if db.is_unique_violation() => Err(ApiError::InvalidRequest(
                "username is already taken".to_string(),
            )),
            _ => Err(ApiError::Database(e)),
        },
    }
}
