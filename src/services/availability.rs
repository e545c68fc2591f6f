//! Read-only seat-map view for a show.

use serde::Serialize;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::SeatClass;
use crate::services::pricing;

#[derive(Debug, Serialize)]
pub struct SeatAvailability {
    pub id: i64,
    pub row: String,
    pub number: i32,
    pub class: SeatClass,
    pub is_booked: bool,
    /// Resolved price; 0 when the class has no configured price yet. Booking
    /// such a seat is rejected by the reservation transaction.
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct ShowAvailability {
    pub show_id: i64,
    pub movie_title: String,
    pub hall_name: String,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub language: String,
    pub seats: Vec<SeatAvailability>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    row_label: String,
    number: i32,
    class: SeatClass,
    is_booked: bool,
}

/// Every seat of the show's hall, annotated with its live-claim state and
/// resolved price. Never mutates anything; a seat reported available may be
/// claimed a moment later, which the reservation transaction re-checks
/// under lock.
pub async fn get_availability(pool: &PgPool, show_id: i64) -> AppResult<ShowAvailability> {
    let meta: Option<(i64, String, String, chrono::DateTime<chrono::Utc>, String)> =
        sqlx::query_as(
            "SELECT s.hall_id, m.title, h.name, s.starts_at, s.language
             FROM shows s
             JOIN movies m ON m.id = s.movie_id
             JOIN halls h ON h.id = s.hall_id
             WHERE s.id = $1",
        )
        .bind(show_id)
        .fetch_optional(pool)
        .await?;

    let (hall_id, movie_title, hall_name, starts_at, language) =
        meta.ok_or_else(|| AppError::NotFound(format!("show {show_id}")))?;

    // A claim counts as booked only while its parent booking is live;
    // `active` is maintained in lock-step with the booking status.
    let rows: Vec<SeatRow> = sqlx::query_as(
        "SELECT s.id, s.row_label, s.number, s.class,
                EXISTS(
                  SELECT 1 FROM booking_seats bs
                  WHERE bs.show_id = $1 AND bs.seat_id = s.id AND bs.active
                ) AS is_booked
         FROM seats s
         WHERE s.hall_id = $2
         ORDER BY s.id",
    )
    .bind(show_id)
    .bind(hall_id)
    .fetch_all(pool)
    .await?;

    let prices = pricing::price_map(pool, show_id).await?;

    let seats = rows
        .into_iter()
        .map(|row| SeatAvailability {
            id: row.id,
            row: row.row_label,
            number: row.number,
            class: row.class,
            is_booked: row.is_booked,
            price: prices.get(&row.class).copied().unwrap_or(0),
        })
        .collect();

    Ok(ShowAvailability {
        show_id,
        movie_title,
        hall_name,
        starts_at,
        language,
        seats,
    })
}
