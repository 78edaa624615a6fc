use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Closed status set. Only BOOKED items occupy the seat-uniqueness domain;
/// CANCELLED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    pub status: ReservationStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReservationItem {
    pub id: i64,
    pub reservation_id: i64,
    pub seat_id: i64,
    // Denormalized copy of reservation.showtime_id; scopes the uniqueness
    // check to one showtime.
    pub showtime_id: i64,
    pub active: bool,
}
