//! The reservation transaction: the only writer of `booking_seats` rows and
//! the gate for the exclusivity invariant (at most one live claim per
//! (show, seat)).
//!
//! Two layers guard against concurrent double-booking:
//! 1. `SELECT .. FOR UPDATE` on existing live claims for the requested
//!    seats, serializing against transactions that already hold them.
//! 2. The partial unique index on `booking_seats (show_id, seat_id) WHERE
//!    active`, which catches two first-claim transactions racing each other
//!    (neither sees a row to lock). That violation is converted into
//!    `SeatConflictError` instead of surfacing as a storage error.
//!
//! A check-then-insert without both would be a race.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{Booking, BookingStatus, SeatClass};
use crate::services::pricing;

#[derive(Debug, Serialize)]
pub struct BookedSeat {
    pub seat_id: i64,
    pub row: String,
    pub number: i32,
    pub class: SeatClass,
    pub price_paid: i64,
}

#[derive(Debug, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub seats: Vec<BookedSeat>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    row_label: String,
    number: i32,
    class: SeatClass,
}

/// Atomically claims `seat_ids` for `show_id` on behalf of `user_id`.
///
/// All-or-nothing: one already-claimed seat aborts the whole reservation
/// with `SeatConflict` naming the conflicting seats. Prices are resolved
/// inside the transaction and locked into each claim row; a class with no
/// configured price blocks the booking. When a payment reference is
/// supplied the booking is created `paid` directly, otherwise `pending`.
pub async fn create_reservation(
    pool: &PgPool,
    max_seats: usize,
    user_id: i64,
    show_id: i64,
    seat_ids: &[i64],
    payment_ref: Option<String>,
) -> AppResult<BookingDetails> {
    let mut requested: Vec<i64> = seat_ids.to_vec();
    requested.sort_unstable();
    requested.dedup();

    if requested.is_empty() || requested.len() > max_seats {
        return Err(AppError::LimitExceeded {
            requested: requested.len(),
            max: max_seats,
        });
    }

    let mut tx = pool.begin().await?;

    let hall_id: Option<i64> = sqlx::query_scalar("SELECT hall_id FROM shows WHERE id = $1")
        .bind(show_id)
        .fetch_optional(&mut *tx)
        .await?;
    let hall_id = hall_id.ok_or_else(|| AppError::NotFound(format!("show {show_id}")))?;

    let seats: Vec<SeatRow> = sqlx::query_as(
        "SELECT id, row_label, number, class
         FROM seats
         WHERE hall_id = $1 AND id = ANY($2)",
    )
    .bind(hall_id)
    .bind(&requested)
    .fetch_all(&mut *tx)
    .await?;

    if seats.len() != requested.len() {
        let found: Vec<i64> = seats.iter().map(|s| s.id).collect();
        let missing = requested
            .iter()
            .find(|id| !found.contains(id))
            .copied()
            .unwrap_or_default();
        return Err(AppError::NotFound(format!(
            "seat {missing} in show {show_id}"
        )));
    }

    // Locking re-check within the transaction, not from any pre-read
    // snapshot. Blocks briefly behind a concurrent claim on the same seats.
    let conflicting: Vec<i64> = sqlx::query_scalar(
        "SELECT seat_id FROM booking_seats
         WHERE show_id = $1 AND seat_id = ANY($2) AND active
         FOR UPDATE",
    )
    .bind(show_id)
    .bind(&requested)
    .fetch_all(&mut *tx)
    .await?;

    if !conflicting.is_empty() {
        return Err(AppError::SeatConflict(seat_labels(&seats, &conflicting)));
    }

    let prices = pricing::price_map(&mut *tx, show_id).await?;
    let mut priced: HashMap<i64, i64> = HashMap::with_capacity(seats.len());
    let mut total: i64 = 0;
    for seat in &seats {
        let amount = prices.get(&seat.class).copied().ok_or_else(|| {
            AppError::Validation(format!(
                "no price configured for {} seats on this show",
                seat.class.as_str()
            ))
        })?;
        priced.insert(seat.id, amount);
        total += amount;
    }

    let status = if payment_ref.is_some() {
        BookingStatus::Paid
    } else {
        BookingStatus::Pending
    };

    let booking: Booking = sqlx::query_as(
        "INSERT INTO bookings (user_id, show_id, status, total_amount, payment_ref)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, user_id, show_id, status, total_amount, payment_ref,
                   created_at, cancelled_at",
    )
    .bind(user_id)
    .bind(show_id)
    .bind(status)
    .bind(total)
    .bind(&payment_ref)
    .fetch_one(&mut *tx)
    .await?;

    let claim_seat_ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
    let claim_prices: Vec<i64> = seats.iter().map(|s| priced[&s.id]).collect();

    let insert_result = sqlx::query(
        "INSERT INTO booking_seats (booking_id, show_id, seat_id, price_paid)
         SELECT $1, $2, seat_id, price
         FROM UNNEST($3::bigint[], $4::bigint[]) AS t(seat_id, price)",
    )
    .bind(booking.id)
    .bind(show_id)
    .bind(&claim_seat_ids)
    .bind(&claim_prices)
    .execute(&mut *tx)
    .await;

    if let Err(err) = insert_result {
        // Lost a race against a claim committed after our locking read saw
        // nothing; the live-claim index rejects it. Whole tx rolls back,
        // then the winner's now-committed claims tell us which of the
        // requested seats to name.
        if is_unique_violation(&err) {
            tx.rollback().await.ok();
            let now_claimed: Vec<i64> = sqlx::query_scalar(
                "SELECT seat_id FROM booking_seats
                 WHERE show_id = $1 AND seat_id = ANY($2) AND active",
            )
            .bind(show_id)
            .bind(&requested)
            .fetch_all(pool)
            .await?;
            let ids = conflict_ids(&requested, &now_claimed);
            return Err(AppError::SeatConflict(seat_labels(&seats, ids)));
        }
        return Err(err.into());
    }

    tx.commit().await?;

    info!(
        booking_id = booking.id,
        show_id,
        seat_count = seats.len(),
        total,
        "reservation created"
    );

    let seats = seats
        .into_iter()
        .map(|s| BookedSeat {
            price_paid: priced[&s.id],
            seat_id: s.id,
            row: s.row_label,
            number: s.number,
            class: s.class,
        })
        .collect();

    Ok(BookingDetails { booking, seats })
}

/// The seats to blame for a lost insert race: the claims observed after
/// rollback when there are any, otherwise every requested seat (the claim
/// was already released again; a retry will go through).
fn conflict_ids<'a>(requested: &'a [i64], observed: &'a [i64]) -> &'a [i64] {
    if observed.is_empty() {
        requested
    } else {
        observed
    }
}

fn seat_labels(seats: &[SeatRow], ids: &[i64]) -> Vec<String> {
    let mut labels: Vec<String> = seats
        .iter()
        .filter(|s| ids.contains(&s.id))
        .map(|s| format!("{}{}", s.row_label, s.number))
        .collect();
    labels.sort();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(id: i64, row: &str, number: i32) -> SeatRow {
        SeatRow {
            id,
            row_label: row.to_string(),
            number,
            class: SeatClass::Basic,
        }
    }

    #[test]
    fn conflict_labels_name_only_conflicting_seats() {
        let seats = vec![seat(1, "A", 1), seat(2, "A", 2), seat(3, "B", 1)];
        assert_eq!(seat_labels(&seats, &[2, 3]), vec!["A2", "B1"]);
    }

    #[test]
    fn insert_race_blames_only_observed_claims() {
        assert_eq!(conflict_ids(&[1, 2, 3], &[2]), &[2]);
        assert_eq!(conflict_ids(&[1, 2, 3], &[2, 3]), &[2, 3]);
        // winner already released again: fall back to the full request
        assert_eq!(conflict_ids(&[1, 2, 3], &[]), &[1, 2, 3]);
    }

    #[test]
    fn labels_are_sorted_for_stable_error_messages() {
        let seats = vec![seat(9, "C", 4), seat(4, "A", 7)];
        assert_eq!(seat_labels(&seats, &[9, 4]), vec!["A7", "C4"]);
    }
}
