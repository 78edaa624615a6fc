//! End-to-end reservation ledger tests against a real Postgres, since the
//! no-double-booking invariant lives in the partial unique index and can
//! only be exercised with the storage engine in the loop.
//!
//! Ignored by default; run with a database available:
//!
//!     DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU64, Ordering};

use cinema_system::error::ApiError;
use cinema_system::middleware::AuthUser;
use cinema_system::models::Role;
use cinema_system::services::availability;
use cinema_system::services::ledger::{self, BookingRequest};

static SEQ: AtomicU64 = AtomicU64::new(0);

fn unique(prefix: &str) -> String {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{n}", std::process::id())
}

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect");
    sqlx::migrate!("./src/migrations")
        .run(&pool)
        .await
        .expect("migrations failed");
    pool
}

struct Fixture {
    showtime_id: i64,
    seat_ids: Vec<i64>,
    price_cents: i64,
}

async fn new_user(pool: &PgPool, role: Role) -> AuthUser {
    let username = unique("user");
    let role_str = match role {
        Role::Admin => "ADMIN",
        Role::User => "USER",
    };
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, role)
         VALUES ($1, $2, 'x', $3) RETURNING id",
    )
    .bind(&username)
    .bind(format!("{username}@example.com"))
    .bind(role_str)
    .fetch_one(pool)
    .await
    .unwrap();
    AuthUser {
        user_id: id,
        username,
        role,
    }
}

/// One auditorium with `seats` seats in row A, one movie, one showtime
/// starting in an hour.
async fn seed_showtime(pool: &PgPool, seats: i32, price_cents: i64) -> Fixture {
    let auditorium_id: i64 = sqlx::query_scalar(
        "INSERT INTO auditoriums (name, capacity) VALUES ($1, $2) RETURNING id",
    )
    .bind(unique("hall"))
    .bind(seats)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut seat_ids = Vec::new();
    for number in 1..=seats {
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO seats (auditorium_id, "row", number) VALUES ($1, 'A', $2) RETURNING id"#,
        )
        .bind(auditorium_id)
        .bind(number)
        .fetch_one(pool)
        .await
        .unwrap();
        seat_ids.push(id);
    }

    let movie_id: i64 =
        sqlx::query_scalar("INSERT INTO movies (title) VALUES ($1) RETURNING id")
            .bind(unique("movie"))
            .fetch_one(pool)
            .await
            .unwrap();

    let starts_at = Utc::now() + Duration::hours(1);
    let showtime_id: i64 = sqlx::query_scalar(
        "INSERT INTO showtimes (movie_id, auditorium_id, starts_at, ends_at, price_cents)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(movie_id)
    .bind(auditorium_id)
    .bind(starts_at)
    .bind(starts_at + Duration::hours(2))
    .bind(price_cents)
    .fetch_one(pool)
    .await
    .unwrap();

    Fixture {
        showtime_id,
        seat_ids,
        price_cents,
    }
}

fn booking(fx: &Fixture, seats: &[i64]) -> BookingRequest {
    BookingRequest {
        showtime_id: fx.showtime_id,
        seat_ids: seats.to_vec(),
    }
}

async fn active_items(pool: &PgPool, showtime_id: i64, seat_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservation_items WHERE showtime_id = $1 AND seat_id = $2 AND active",
    )
    .bind(showtime_id)
    .bind(seat_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn booking_computes_flat_total() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 4, 500).await;
    let user = new_user(&pool, Role::User).await;

    let view = ledger::create_reservation(&pool, &user, &booking(&fx, &fx.seat_ids[..3]), Utc::now())
        .await
        .unwrap();

    assert_eq!(view.total_cents, 3 * fx.price_cents);
    assert_eq!(view.items.len(), 3);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn concurrent_bookings_of_one_seat_have_exactly_one_winner() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;

    let mut futures = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let user = new_user(&pool, Role::User).await;
        let req = booking(&fx, &fx.seat_ids);
        futures.push(tokio::spawn(async move {
            ledger::create_reservation(&pool, &user, &req, Utc::now()).await
        }));
    }

    let results = futures::future::join_all(futures).await;
    let mut won = 0;
    let mut lost = 0;
    for r in results {
        match r.unwrap() {
            Ok(_) => won += 1,
            Err(ApiError::SeatUnavailable) => lost += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(lost, 7);
    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[0]).await, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn partially_taken_request_writes_nothing() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 2, 500).await;
    let first = new_user(&pool, Role::User).await;
    let second = new_user(&pool, Role::User).await;

    ledger::create_reservation(&pool, &first, &booking(&fx, &fx.seat_ids[1..]), Utc::now())
        .await
        .unwrap();

    // seat A1 free, A2 already booked: the whole request must fail
    let err = ledger::create_reservation(&pool, &second, &booking(&fx, &fx.seat_ids), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::SeatUnavailable));

    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[0]).await, 0);
    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[1]).await, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn cancel_frees_the_seat_for_someone_else() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;
    let first = new_user(&pool, Role::User).await;
    let second = new_user(&pool, Role::User).await;

    let res = ledger::create_reservation(&pool, &first, &booking(&fx, &fx.seat_ids), Utc::now())
        .await
        .unwrap();

    // while booked, the seat is reported unavailable and not re-bookable
    let avail = availability::for_showtime(&pool, fx.showtime_id).await.unwrap();
    assert!(!avail[0].is_available);
    assert!(matches!(
        ledger::create_reservation(&pool, &second, &booking(&fx, &fx.seat_ids), Utc::now()).await,
        Err(ApiError::SeatUnavailable)
    ));

    ledger::cancel_reservation(&pool, &first, res.id).await.unwrap();

    let avail = availability::for_showtime(&pool, fx.showtime_id).await.unwrap();
    assert!(avail[0].is_available);

    // now the other user can take it
    ledger::create_reservation(&pool, &second, &booking(&fx, &fx.seat_ids), Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn second_cancel_is_rejected() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;
    let user = new_user(&pool, Role::User).await;

    let res = ledger::create_reservation(&pool, &user, &booking(&fx, &fx.seat_ids), Utc::now())
        .await
        .unwrap();

    ledger::cancel_reservation(&pool, &user, res.id).await.unwrap();
    let err = ledger::cancel_reservation(&pool, &user, res.id).await.unwrap_err();
    assert!(matches!(err, ApiError::AlreadyCancelled));
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn only_owner_or_admin_may_cancel() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 2, 500).await;
    let owner = new_user(&pool, Role::User).await;
    let stranger = new_user(&pool, Role::User).await;
    let admin = new_user(&pool, Role::Admin).await;

    let res = ledger::create_reservation(&pool, &owner, &booking(&fx, &fx.seat_ids[..1]), Utc::now())
        .await
        .unwrap();

    let err = ledger::cancel_reservation(&pool, &stranger, res.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    ledger::cancel_reservation(&pool, &admin, res.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn past_showtime_is_not_bookable() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;
    let user = new_user(&pool, Role::User).await;

    // "now" two hours in the future puts the showtime in the past
    let late = Utc::now() + Duration::hours(2);
    let err = ledger::create_reservation(&pool, &user, &booking(&fx, &fx.seat_ids), late)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[0]).await, 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn seat_from_another_auditorium_is_rejected_with_zero_writes() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;
    let other = seed_showtime(&pool, 1, 500).await;
    let user = new_user(&pool, Role::User).await;

    let err = ledger::create_reservation(
        &pool,
        &user,
        &booking(&fx, &[fx.seat_ids[0], other.seat_ids[0]]),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[0]).await, 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn duplicate_seat_in_one_request_is_rejected() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 1, 500).await;
    let user = new_user(&pool, Role::User).await;

    let err = ledger::create_reservation(
        &pool,
        &user,
        &booking(&fx, &[fx.seat_ids[0], fx.seat_ids[0]]),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::SeatUnavailable));
    assert_eq!(active_items(&pool, fx.showtime_id, fx.seat_ids[0]).await, 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn users_see_only_their_own_reservations() {
    let pool = connect().await;
    let fx = seed_showtime(&pool, 2, 500).await;
    let alice = new_user(&pool, Role::User).await;
    let bob = new_user(&pool, Role::User).await;

    let res = ledger::create_reservation(&pool, &alice, &booking(&fx, &fx.seat_ids[..1]), Utc::now())
        .await
        .unwrap();

    let bobs = ledger::list_reservations(&pool, &bob).await.unwrap();
    assert!(bobs.iter().all(|r| r.id != res.id));

    let err = ledger::get_reservation(&pool, &bob, res.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    let own = ledger::get_reservation(&pool, &alice, res.id).await.unwrap();
    assert_eq!(own.items.len(), 1);
}
