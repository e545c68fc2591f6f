pub mod bookings;
pub mod halls;
pub mod payments;
pub mod shows;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(halls::routes())
        .merge(shows::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
}
