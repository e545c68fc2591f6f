use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::BookingStatus;
use crate::services::{reservation, settlement};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings", get(get_user_bookings))
        .route("/bookings/{id}/cancel", put(cancel_booking))
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    show_id: i64,
    seat_ids: Vec<i64>,
    /// Supplied when payment was authorized synchronously; the booking is
    /// then created paid directly.
    payment_ref: Option<String>,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let details = reservation::create_reservation(
        &state.db.pool,
        state.config.booking.max_seats_per_booking,
        user.user_id,
        req.show_id,
        &req.seat_ids,
        req.payment_ref,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

#[derive(Debug, Serialize)]
struct BookingSeatResponse {
    seat_id: i64,
    row: String,
    number: i32,
    price_paid: i64,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    id: i64,
    show_id: i64,
    status: BookingStatus,
    total_amount: i64,
    seats: Vec<BookingSeatResponse>,
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query(
        r#"
        SELECT b.id AS bid, b.show_id AS sid, b.status AS status,
               b.total_amount AS total,
               bs.seat_id AS seat_id, bs.price_paid AS price_paid,
               s.row_label AS row_label, s.number AS number
        FROM bookings b
        LEFT JOIN booking_seats bs ON bs.booking_id = b.id
        LEFT JOIN seats s ON s.id = bs.seat_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC, bs.seat_id
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await?;

    use std::collections::BTreeMap;
    let mut map: BTreeMap<i64, BookingResponse> = BTreeMap::new();
    for r in rows {
        let bid: i64 = r.get("bid");
        let entry = map.entry(bid).or_insert_with(|| BookingResponse {
            id: bid,
            show_id: r.get("sid"),
            status: r.get("status"),
            total_amount: r.get("total"),
            seats: Vec::new(),
        });
        if let Ok(seat_id) = r.try_get::<i64, _>("seat_id") {
            entry.seats.push(BookingSeatResponse {
                seat_id,
                row: r.get("row_label"),
                number: r.get("number"),
                price_paid: r.get("price_paid"),
            });
        }
    }

    let resp: Vec<BookingResponse> = map.into_values().collect();
    Ok((StatusCode::OK, Json(resp)))
}

// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let booking = settlement::cancel_booking(
        &state.db.pool,
        &state.config.booking,
        state.notifier.as_ref(),
        booking_id,
        &user,
    )
    .await?;

    Ok((StatusCode::OK, Json(booking)))
}
