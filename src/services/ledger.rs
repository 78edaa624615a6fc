//! ledger.rs
//!
//! The reservation ledger: the one component allowed to write reservations
//! and their items. All writes happen in a single transaction per request,
//! and the no-double-booking invariant is enforced by the partial unique
//! index `uq_active_seat_per_showtime` at commit time, not by a
//! check-then-insert in application code. Two concurrent bookings of the
//! same (showtime, seat) both reach the insert; exactly one commits, the
//! other gets a unique violation that we surface as `SeatUnavailable`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::{ReservationStatus, Seat, Showtime};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub showtime_id: i64,
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookedSeat {
    pub id: i64,
    pub row: String,
    pub number: i32,
}

#[derive(Debug, Serialize)]
pub struct ReservationItemView {
    pub id: i64,
    pub seat: BookedSeat,
}

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: i64,
    pub showtime_id: i64,
    pub status: ReservationStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReservationItemView>,
}

/* ---------- authorization ---------- */

/// Owner-or-admin predicate used for cancel and direct lookup.
pub fn can_modify(caller: &AuthUser, owner_id: i64) -> bool {
    caller.is_admin() || caller.user_id == owner_id
}

/* ---------- pure validation ---------- */

fn ensure_upcoming(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ApiError> {
    if starts_at <= now {
        return Err(ApiError::InvalidRequest(
            "cannot book a past or started showtime".to_string(),
        ));
    }
    Ok(())
}

/// Every requested seat must exist and sit in the showtime's auditorium.
/// Duplicates in the request are deliberately not rejected here; the unique
/// index refuses them at commit time like any other double booking.
fn ensure_seats_bookable(
    requested: &[i64],
    found: &[Seat],
    auditorium_id: i64,
) -> Result<(), ApiError> {
    for id in requested {
        if !found.iter().any(|s| s.id == *id) {
            return Err(ApiError::NotFound("seat"));
        }
    }
    if found.iter().any(|s| s.auditorium_id != auditorium_id) {
        return Err(ApiError::InvalidRequest(
            "all seats must belong to the showtime auditorium".to_string(),
        ));
    }
    Ok(())
}

fn compute_total(price_cents: i64, seat_count: usize) -> i64 {
    price_cents * seat_count as i64
}

/* ---------- write path ---------- */

/// Books `seat_ids` for a showtime on behalf of the caller. Atomic: either
/// the reservation and every item commit together, or nothing is written.
/// `now` is injected so the temporal guard is deterministic under test.
pub async fn create_reservation(
    pool: &PgPool,
    caller: &AuthUser,
    req: &BookingRequest,
    now: DateTime<Utc>,
) -> Result<ReservationView, ApiError> {
    if req.seat_ids.is_empty() {
        return Err(ApiError::InvalidRequest(
            "reservation must contain at least one seat".to_string(),
        ));
    }

    let showtime: Showtime = sqlx::query_as("SELECT * FROM showtimes WHERE id = $1")
        .bind(req.showtime_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("showtime"))?;

    ensure_upcoming(showtime.starts_at, now)?;

    let seats: Vec<Seat> = sqlx::query_as(
        r#"SELECT id, auditorium_id, "row", number FROM seats WHERE id = ANY($1)"#,
    )
    .bind(&req.seat_ids)
    .fetch_all(pool)
    .await?;

    ensure_seats_bookable(&req.seat_ids, &seats, showtime.auditorium_id)?;

    let total_cents = compute_total(showtime.price_cents, req.seat_ids.len());

    let mut tx = pool.begin().await?;

    let (reservation_id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        "INSERT INTO reservations (user_id, showtime_id, status, total_cents)
         VALUES ($1, $2, $3, $4)
         RETURNING id, created_at",
    )
    .bind(caller.user_id)
    .bind(req.showtime_id)
    .bind(ReservationStatus::Booked)
    .bind(total_cents)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(req.seat_ids.len());
    for seat_id in &req.seat_ids {
        let insert = sqlx::query_scalar::<_, i64>(
            "INSERT INTO reservation_items (reservation_id, seat_id, showtime_id)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(reservation_id)
        .bind(seat_id)
        .bind(req.showtime_id)
        .fetch_one(&mut *tx)
        .await;

        let item_id = match insert {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await.ok();
                let err = ApiError::from_booking_insert(e);
                if matches!(err, ApiError::SeatUnavailable) {
                    tracing::warn!(
                        "booking lost the race for seat {} at showtime {}",
                        seat_id,
                        req.showtime_id
                    );
                }
                return Err(err);
            }
        };
        items.push((item_id, *seat_id));
    }

    tx.commit().await.map_err(ApiError::from_booking_insert)?;

    tracing::info!(
        "reservation {} booked: showtime {}, {} seat(s), total {} cents",
        reservation_id,
        req.showtime_id,
        req.seat_ids.len(),
        total_cents
    );

    let views = items
        .into_iter()
        .map(|(item_id, seat_id)| {
            // seat presence was validated above
            let seat = seats.iter().find(|s| s.id == seat_id);
            ReservationItemView {
                id: item_id,
                seat: BookedSeat {
                    id: seat_id,
                    row: seat.map(|s| s.row.clone()).unwrap_or_default(),
                    number: seat.map(|s| s.number).unwrap_or_default(),
                },
            }
        })
        .collect();

    Ok(ReservationView {
        id: reservation_id,
        showtime_id: req.showtime_id,
        status: ReservationStatus::Booked,
        total_cents,
        created_at,
        items: views,
    })
}

/// BOOKED -> CANCELLED. Clears the items' active flags in the same
/// transaction so the seats leave the uniqueness domain atomically. A second
/// cancel is an explicit `AlreadyCancelled` error, never a silent success.
/// Cancelling after the showtime has started is allowed.
pub async fn cancel_reservation(
    pool: &PgPool,
    caller: &AuthUser,
    reservation_id: i64,
) -> Result<(), ApiError> {
    let row: Option<(i64, ReservationStatus)> =
        sqlx::query_as("SELECT user_id, status FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(pool)
            .await?;

    let (owner_id, status) = row.ok_or(ApiError::NotFound("reservation"))?;

    if !can_modify(caller, owner_id) {
        return Err(ApiError::Forbidden);
    }
    if status == ReservationStatus::Cancelled {
        return Err(ApiError::AlreadyCancelled);
    }

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE reservations SET status = $1 WHERE id = $2 AND status = $3",
    )
    .bind(ReservationStatus::Cancelled)
    .bind(reservation_id)
    .bind(ReservationStatus::Booked)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // another cancel slipped in between the read and this update
    if updated == 0 {
        tx.rollback().await.ok();
        return Err(ApiError::AlreadyCancelled);
    }

    sqlx::query("UPDATE reservation_items SET active = FALSE WHERE reservation_id = $1")
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("reservation {} cancelled, seats freed", reservation_id);
    Ok(())
}

/* ---------- read path ---------- */

#[derive(sqlx::FromRow)]
struct ReservationJoinRow {
    rid: i64,
    showtime_id: i64,
    status: ReservationStatus,
    total_cents: i64,
    created_at: DateTime<Utc>,
    item_id: Option<i64>,
    seat_id: Option<i64>,
    seat_row: Option<String>,
    seat_number: Option<i32>,
}

const RESERVATION_JOIN: &str = r#"
    SELECT r.id as rid, r.showtime_id, r.status, r.total_cents, r.created_at,
           ri.id as item_id, s.id as seat_id, s."row" as seat_row, s.number as seat_number
    FROM reservations r
    LEFT JOIN reservation_items ri ON ri.reservation_id = r.id
    LEFT JOIN seats s ON s.id = ri.seat_id
"#;

fn group_rows(rows: Vec<ReservationJoinRow>) -> Vec<ReservationView> {
    let mut map: BTreeMap<i64, ReservationView> = BTreeMap::new();
    for r in rows {
        let entry = map.entry(r.rid).or_insert_with(|| ReservationView {
            id: r.rid,
            showtime_id: r.showtime_id,
            status: r.status,
            total_cents: r.total_cents,
            created_at: r.created_at,
            items: Vec::new(),
        });
        if let (Some(item_id), Some(seat_id)) = (r.item_id, r.seat_id) {
            entry.items.push(ReservationItemView {
                id: item_id,
                seat: BookedSeat {
                    id: seat_id,
                    row: r.seat_row.unwrap_or_default(),
                    number: r.seat_number.unwrap_or_default(),
                },
            });
        }
    }
    map.into_values().collect()
}

/// Admins see every reservation, regular users only their own.
pub async fn list_reservations(
    pool: &PgPool,
    caller: &AuthUser,
) -> Result<Vec<ReservationView>, ApiError> {
    let rows: Vec<ReservationJoinRow> = if caller.is_admin() {
        sqlx::query_as(&format!("{RESERVATION_JOIN} ORDER BY rid, seat_row, seat_number"))
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as(&format!(
            "{RESERVATION_JOIN} WHERE r.user_id = $1 ORDER BY rid, seat_row, seat_number"
        ))
        .bind(caller.user_id)
        .fetch_all(pool)
        .await?
    };
    Ok(group_rows(rows))
}

pub async fn get_reservation(
    pool: &PgPool,
    caller: &AuthUser,
    reservation_id: i64,
) -> Result<ReservationView, ApiError> {
    let owner_id: Option<i64> =
        sqlx::query_scalar("SELECT user_id FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(pool)
            .await?;

    let owner_id = owner_id.ok_or(ApiError::NotFound("reservation"))?;
    if !can_modify(caller, owner_id) {
        return Err(ApiError::Forbidden);
    }

    let rows: Vec<ReservationJoinRow> = sqlx::query_as(&format!(
        "{RESERVATION_JOIN} WHERE r.id = $1 ORDER BY seat_row, seat_number"
    ))
    .bind(reservation_id)
    .fetch_all(pool)
    .await?;

    group_rows(rows)
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound("reservation"))
}
