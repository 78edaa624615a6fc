pub mod users;
pub mod catalog;
pub mod showtimes;
pub mod reservations;
pub mod reports;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(catalog::routes())
        .merge(showtimes::routes())
        .merge(reservations::routes())
        .merge(reports::routes())
}
