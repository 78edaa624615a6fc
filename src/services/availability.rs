//! Seat availability for one showtime: every seat of the showtime's
//! auditorium, marked free or taken. Only active (BOOKED) items suppress a
//! seat; cancelled reservations never do. This is a plain read with no
//! locking: a seat shown free may be gone a moment later, and the ledger's
//! commit-time check is what actually decides.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;

use crate::error::ApiError;
use crate::models::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAvailability {
    pub seat_id: i64,
    pub row: String,
    pub number: i32,
    pub is_available: bool,
}

/// Pure derivation: mark each seat against the booked set, ordered by row
/// then number.
pub fn derive(seats: Vec<Seat>, booked: &HashSet<i64>) -> Vec<SeatAvailability> {
    let mut out: Vec<SeatAvailability> = seats
        .into_iter()
        .map(|s| SeatAvailability {
            is_available: !booked.contains(&s.id),
            seat_id: s.id,
            row: s.row,
            number: s.number,
        })
        .collect();
    out.sort_by(|a, b| a.row.cmp(&b.row).then(a.number.cmp(&b.number)));
    out
}

pub async fn for_showtime(
    pool: &PgPool,
    showtime_id: i64,
) -> Result<Vec<SeatAvailability>, ApiError> {
    let auditorium_id: Option<i64> =
        sqlx::query_scalar("SELECT auditorium_id FROM showtimes WHERE id = $1")
            .bind(showtime_id)
            .fetch_optional(pool)
            .await?;
    let auditorium_id = auditorium_id.ok_or(ApiError::NotFound("showtime"))?;

    let seats: Vec<Seat> = sqlx::query_as(
        r#"SELECT id, auditorium_id, "row", number FROM seats WHERE auditorium_id = $1"#,
    )
    .bind(auditorium_id)
    .fetch_all(pool)
    .await?;

    let booked: Vec<i64> = sqlx::query_scalar(
        "SELECT seat_id FROM reservation_items WHERE showtime_id = $1 AND active",
    )
    .bind(showtime_id)
    .fetch_all(pool)
    .await?;

    Ok(derive(seats, &booked.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seat(id: i64, row: &str, number: i32) -> Seat {
        Seat {
            id,
            auditorium_id: 1,
            row: row.to_string(),
            number,
        }
    }

    #[test]
    fn booked_seats_are_marked_unavailable() {
        let seats = vec![seat(1, "A", 1), seat(2, "A", 2), seat(3, "B", 1)];
        let booked: HashSet<i64> = [2].into_iter().collect();

        let out = derive(seats, &booked);
        assert_eq!(
            out.iter().map(|s| (s.seat_id, s.is_available)).collect::<Vec<_>>(),
            vec![(1, true), (2, false), (3, true)]
        );
    }

    #[test]
    fn ordering_is_row_then_number() {
        let seats = vec![seat(4, "B", 2), seat(1, "A", 10), seat(2, "A", 2), seat(3, "B", 1)];
        let out = derive(seats, &HashSet::new());
        assert_eq!(
            out.iter().map(|s| s.seat_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn empty_booked_set_leaves_everything_available() {
        let seats = vec![seat(1, "A", 1), seat(2, "A", 2)];
        let out = derive(seats, &HashSet::new());
        assert!(out.iter().all(|s| s.is_available));
    }

    proptest! {
        // is_available is exactly membership in the booked set, and no seat
        // is lost or invented by the derivation.
        #[test]
        fn availability_mirrors_the_booked_set(
            ids in proptest::collection::hash_set(1i64..500, 0..40),
            booked in proptest::collection::hash_set(1i64..500, 0..40),
        ) {
            let seats: Vec<Seat> = ids.iter()
                .map(|&id| seat(id, if id % 2 == 0 { "A" } else { "B" }, id as i32))
                .collect();
            let out = derive(seats, &booked);

            prop_assert_eq!(out.len(), ids.len());
            for s in &out {
                prop_assert!(ids.contains(&s.seat_id));
                prop_assert_eq!(s.is_available, !booked.contains(&s.seat_id));
            }
            for w in out.windows(2) {
                prop_assert!(
                    (w[0].row.clone(), w[0].number) <= (w[1].row.clone(), w[1].number)
                );
            }
        }
    }
}
