//! Read-only aggregates for administrators. Derived views over the ledger;
//! no invariants of their own. Both count only BOOKED bookings so the
//! numbers agree with what the uniqueness constraint protects.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::ApiError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CapacityRow {
    pub showtime_id: i64,
    pub movie_title: String,
    pub starts_at: DateTime<Utc>,
    pub booked_seats: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RevenueRow {
    pub movie_id: i64,
    pub movie_title: String,
    pub total_revenue_cents: i64,
}

/// Seats booked per showtime.
pub async fn capacity(pool: &PgPool) -> Result<Vec<CapacityRow>, ApiError> {
    let rows = sqlx::query_as::<_, CapacityRow>(
        r#"
        SELECT st.id as showtime_id,
               m.title as movie_title,
               st.starts_at,
               COUNT(ri.id) FILTER (WHERE ri.active)::bigint as booked_seats
        FROM showtimes st
        JOIN movies m ON m.id = st.movie_id
        LEFT JOIN reservation_items ri ON ri.showtime_id = st.id
        GROUP BY st.id, m.title, st.starts_at
        ORDER BY st.starts_at, st.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Total revenue per movie over BOOKED reservations.
pub async fn revenue(pool: &PgPool) -> Result<Vec<RevenueRow>, ApiError> {
    let rows = sqlx::query_as::<_, RevenueRow>(
        r#"
        SELECT m.id as movie_id,
               m.title as movie_title,
               COALESCE(SUM(r.total_cents), 0)::bigint as total_revenue_cents
        FROM movies m
        JOIN showtimes st ON st.movie_id = m.id
        JOIN reservations r ON r.showtime_id = st.id AND r.status = 'BOOKED'
        GROUP BY m.id, m.title
        ORDER BY total_revenue_cents DESC, m.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
