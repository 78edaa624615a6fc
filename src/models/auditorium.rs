use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Auditorium {
    pub id: i64,
    pub name: String,
    pub capacity: i32,
}
