//! Catalog CRUD: genres, movies, auditoriums, seats. Read-mostly reference
//! data for the reservation core; writes are admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::{Auditorium, Genre, Movie, Seat};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/auditoriums", get(list_auditoriums).post(create_auditorium))
        .route("/auditoriums/{id}", get(get_auditorium))
        .route("/seats", get(list_seats).post(create_seat))
}

fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn name_taken(err: sqlx::Error, what: &'static str) -> ApiError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            ApiError::InvalidRequest(format!("{what} already exists"))
        }
        _ => ApiError::Database(err),
    }
}

/* ---------- GENRES ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateGenreRequest {
    #[validate(length(min = 1, max = 50))]
    name: String,
}

async fn create_genre(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let genre: Genre = sqlx::query_as("INSERT INTO genres (name) VALUES ($1) RETURNING *")
        .bind(&req.name)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| name_taken(e, "genre"))?;
    Ok((StatusCode::CREATED, Json(genre)))
}

async fn list_genres(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let genres: Vec<Genre> = sqlx::query_as("SELECT * FROM genres ORDER BY name")
        .fetch_all(&state.db.pool)
        .await?;
    Ok(Json(genres))
}

/* ---------- MOVIES ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateMovieRequest {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    poster_url: String,
    #[serde(default)]
    genre_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct MovieView {
    #[serde(flatten)]
    movie: Movie,
    genres: Vec<Genre>,
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let genres: Vec<Genre> = sqlx::query_as("SELECT * FROM genres WHERE id = ANY($1)")
        .bind(&req.genre_ids)
        .fetch_all(&state.db.pool)
        .await?;
    if genres.len() != req.genre_ids.len() {
        return Err(ApiError::NotFound("genre"));
    }

    let mut tx = state.db.pool.begin().await?;
    let movie: Movie = sqlx::query_as(
        "INSERT INTO movies (title, description, poster_url) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.poster_url)
    .fetch_one(&mut *tx)
    .await?;

    for genre_id in &req.genre_ids {
        sqlx::query("INSERT INTO movie_genres (movie_id, genre_id) VALUES ($1, $2)")
            .bind(movie.id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(MovieView { movie, genres })))
}

async fn list_movies(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let movies: Vec<Movie> = sqlx::query_as("SELECT * FROM movies ORDER BY id")
        .fetch_all(&state.db.pool)
        .await?;

    #[derive(sqlx::FromRow)]
    struct MovieGenreRow {
        movie_id: i64,
        id: i64,
        name: String,
    }

    let rows: Vec<MovieGenreRow> = sqlx::query_as(
        "SELECT mg.movie_id, g.id, g.name
         FROM movie_genres mg JOIN genres g ON g.id = mg.genre_id
         ORDER BY g.name",
    )
    .fetch_all(&state.db.pool)
    .await?;

    let mut by_movie: BTreeMap<i64, Vec<Genre>> = BTreeMap::new();
    for r in rows {
        by_movie
            .entry(r.movie_id)
            .or_default()
            .push(Genre { id: r.id, name: r.name });
    }

    let views: Vec<MovieView> = movies
        .into_iter()
        .map(|m| {
            let genres = by_movie.remove(&m.id).unwrap_or_default();
            MovieView { movie: m, genres }
        })
        .collect();
    Ok(Json(views))
}

/* ---------- AUDITORIUMS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateAuditoriumRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(range(min = 0))]
    capacity: i32,
}

async fn create_auditorium(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateAuditoriumRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let auditorium: Auditorium =
        sqlx::query_as("INSERT INTO auditoriums (name, capacity) VALUES ($1, $2) RETURNING *")
            .bind(&req.name)
            .bind(req.capacity)
            .fetch_one(&state.db.pool)
            .await
            .map_err(|e| name_taken(e, "auditorium"))?;
    Ok((StatusCode::CREATED, Json(auditorium)))
}

async fn list_auditoriums(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let auditoriums: Vec<Auditorium> = sqlx::query_as("SELECT * FROM auditoriums ORDER BY name")
        .fetch_all(&state.db.pool)
        .await?;
    Ok(Json(auditoriums))
}

async fn get_auditorium(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let auditorium: Option<Auditorium> = sqlx::query_as("SELECT * FROM auditoriums WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?;
    Ok(Json(auditorium.ok_or(ApiError::NotFound("auditorium"))?))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateSeatRequest {
    auditorium_id: i64,
    #[validate(length(min = 1, max = 5))]
    row: String,
    #[validate(range(min = 1))]
    number: i32,
}

async fn create_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateSeatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let auditorium_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM auditoriums WHERE id = $1)")
            .bind(req.auditorium_id)
            .fetch_one(&state.db.pool)
            .await?;
    if !auditorium_exists {
        return Err(ApiError::NotFound("auditorium"));
    }

    let seat: Seat = sqlx::query_as(
        r#"INSERT INTO seats (auditorium_id, "row", number) VALUES ($1, $2, $3) RETURNING *"#,
    )
    .bind(req.auditorium_id)
    .bind(&req.row)
    .bind(req.number)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| name_taken(e, "seat"))?;
    Ok((StatusCode::CREATED, Json(seat)))
}

#[derive(Debug, Deserialize)]
struct SeatsQuery {
    auditorium_id: i64,
}

// GET /api/seats?auditorium_id=N
async fn list_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let seats: Vec<Seat> = sqlx::query_as(
        r#"SELECT * FROM seats WHERE auditorium_id = $1 ORDER BY "row", number"#,
    )
    .bind(params.auditorium_id)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(seats))
}
