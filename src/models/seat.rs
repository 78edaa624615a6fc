use serde::Serialize;
use sqlx::FromRow;

/// A fixed (row, number) slot inside one auditorium. Never reassigned.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Seat {
    pub id: i64,
    pub auditorium_id: i64,
    pub row: String,
    pub number: i32,
}
