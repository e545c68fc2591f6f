//! Payment settlement and cancellation: reconciling external payment
//! outcomes with booking state, and releasing inventory when a booking
//! stops being live.
//!
//! Every transition here flips the booking's `booking_seats.active` flags in
//! the same transaction as the status change, so the exclusivity invariant
//! and the availability view never disagree.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::config::{BookingConfig, PaymentConfig};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Booking, BookingStatus};
use crate::services::notify::Notifier;

/// Settlement token: SHA-256 over amount, booking id, payment reference and
/// the merchant credentials, hex-encoded. The gateway computes the same
/// digest; a mismatch means the notification is not authentic.
pub fn payment_token(
    config: &PaymentConfig,
    booking_id: i64,
    amount: i64,
    payment_ref: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{amount}{booking_id}{payment_ref}{}{}",
            config.merchant_password, config.merchant_id
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

/// Cancellation stays open until `cutoff_minutes` before showtime.
pub fn cancellation_open(
    starts_at: DateTime<Utc>,
    cutoff_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    now < starts_at - Duration::minutes(cutoff_minutes)
}

async fn fetch_booking_for_update(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: i64,
) -> AppResult<Booking> {
    let booking: Option<Booking> = sqlx::query_as(
        "SELECT id, user_id, show_id, status, total_amount, payment_ref,
                created_at, cancelled_at
         FROM bookings WHERE id = $1 FOR UPDATE",
    )
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?;
    booking.ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

async fn release_claims(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: i64,
) -> AppResult<u64> {
    let released = sqlx::query(
        "UPDATE booking_seats SET active = FALSE WHERE booking_id = $1 AND active",
    )
    .bind(booking_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    Ok(released)
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: i64,
    status: BookingStatus,
) -> AppResult<Booking> {
    let booking: Booking = sqlx::query_as(
        "UPDATE bookings SET status = $2,
                cancelled_at = CASE WHEN $2 = 'cancelled'::booking_status
                                    THEN NOW() ELSE cancelled_at END
         WHERE id = $1
         RETURNING id, user_id, show_id, status, total_amount, payment_ref,
                   created_at, cancelled_at",
    )
    .bind(booking_id)
    .bind(status)
    .fetch_one(&mut **tx)
    .await?;
    Ok(booking)
}

/// Verifies the gateway token and finalizes a pending booking as `paid`.
///
/// A token mismatch moves the booking to `failed` (releasing its seats) and
/// surfaces as an authorization error, distinct from an unknown booking.
/// Confirming an already-paid booking is a no-op success.
pub async fn confirm_payment(
    pool: &PgPool,
    config: &PaymentConfig,
    notifier: &dyn Notifier,
    booking_id: i64,
    payment_ref: &str,
    token: &str,
) -> AppResult<Booking> {
    let mut tx = pool.begin().await?;
    let booking = fetch_booking_for_update(&mut tx, booking_id).await?;

    if booking.status == BookingStatus::Paid {
        return Ok(booking); // idempotent
    }
    if !booking.status.can_transition_to(BookingStatus::Paid) {
        return Err(AppError::Validation(format!(
            "booking {booking_id} cannot be confirmed from its current state"
        )));
    }

    let expected = payment_token(config, booking_id, booking.total_amount, payment_ref);
    if token != expected {
        release_claims(&mut tx, booking_id).await?;
        set_status(&mut tx, booking_id, BookingStatus::Failed).await?;
        tx.commit().await?;
        warn!(booking_id, "payment verification failed, booking marked failed");
        return Err(AppError::Authorization(
            "payment verification failed".to_string(),
        ));
    }

    sqlx::query("UPDATE bookings SET payment_ref = $2 WHERE id = $1")
        .bind(booking_id)
        .bind(payment_ref)
        .execute(&mut *tx)
        .await?;
    let booking = set_status(&mut tx, booking_id, BookingStatus::Paid).await?;
    tx.commit().await?;

    info!(booking_id, "payment confirmed");
    // Ticket delivery is a collaborator concern; its failure never unwinds
    // the settled payment.
    if let Err(e) = notifier.booking_confirmed(booking_id).await {
        warn!(booking_id, "booking_confirmed notification failed: {e:?}");
    }
    Ok(booking)
}

/// Records a failed payment: `pending -> failed`, seats immediately
/// reclaimable by the next reservation.
pub async fn fail_payment(pool: &PgPool, booking_id: i64) -> AppResult<Booking> {
    let mut tx = pool.begin().await?;
    let booking = fetch_booking_for_update(&mut tx, booking_id).await?;

    if booking.status == BookingStatus::Failed {
        return Ok(booking); // idempotent
    }
    if !booking.status.can_transition_to(BookingStatus::Failed) {
        return Err(AppError::Validation(format!(
            "booking {booking_id} cannot be failed from its current state"
        )));
    }

    let released = release_claims(&mut tx, booking_id).await?;
    let booking = set_status(&mut tx, booking_id, BookingStatus::Failed).await?;
    tx.commit().await?;

    info!(booking_id, released, "payment failed, seats released");
    Ok(booking)
}

/// Cancels a live booking, subject to ownership and the configured cutoff
/// before showtime. A paid booking additionally records a refund obligation
/// for the payment collaborator to execute.
pub async fn cancel_booking(
    pool: &PgPool,
    config: &BookingConfig,
    notifier: &dyn Notifier,
    booking_id: i64,
    user: &AuthUser,
) -> AppResult<Booking> {
    let mut tx = pool.begin().await?;
    let booking = fetch_booking_for_update(&mut tx, booking_id).await?;

    if booking.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Authorization(
            "booking belongs to another user".to_string(),
        ));
    }
    if !booking.status.is_live() {
        return Err(AppError::Validation(format!(
            "booking {booking_id} is not cancellable from its current state"
        )));
    }

    let starts_at: DateTime<Utc> =
        sqlx::query_scalar("SELECT starts_at FROM shows WHERE id = $1")
            .bind(booking.show_id)
            .fetch_one(&mut *tx)
            .await?;
    if !cancellation_open(starts_at, config.cancellation_cutoff_minutes, Utc::now()) {
        return Err(AppError::CutoffExceeded(format!(
            "cancellation closes {} minutes before showtime",
            config.cancellation_cutoff_minutes
        )));
    }

    let was_paid = booking.status == BookingStatus::Paid;
    let released = release_claims(&mut tx, booking_id).await?;
    let booking = set_status(&mut tx, booking_id, BookingStatus::Cancelled).await?;

    if was_paid {
        sqlx::query("INSERT INTO refunds (booking_id, amount) VALUES ($1, $2)")
            .bind(booking_id)
            .bind(booking.total_amount)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(booking_id, released, was_paid, "booking cancelled");

    if was_paid {
        if let Err(e) = notifier
            .refund_requested(booking_id, booking.total_amount)
            .await
        {
            warn!(booking_id, "refund_requested notification failed: {e:?}");
        }
    }
    Ok(booking)
}

/// Marks the refund obligation settled and the booking `refunded`. Accepts a
/// paid booking refunded directly by the gateway as well as one cancelled
/// here first — but a cancelled booking moves on only against its recorded
/// refund obligation. A never-paid cancellation has none and stays terminal.
pub async fn confirm_refund(pool: &PgPool, booking_id: i64) -> AppResult<Booking> {
    let mut tx = pool.begin().await?;
    let booking = fetch_booking_for_update(&mut tx, booking_id).await?;

    match booking.status {
        BookingStatus::Refunded => return Ok(booking), // idempotent
        BookingStatus::Paid | BookingStatus::Cancelled => {}
        _ => {
            return Err(AppError::Validation(format!(
                "booking {booking_id} has no refund to settle"
            )));
        }
    }

    let settled = sqlx::query(
        "UPDATE refunds SET status = 'settled', settled_at = NOW()
         WHERE booking_id = $1 AND status = 'requested'",
    )
    .bind(booking_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if settled == 0 {
        if booking.status == BookingStatus::Paid {
            // gateway refunded a paid booking without a prior cancellation
            // here; record the obligation as already settled
            sqlx::query(
                "INSERT INTO refunds (booking_id, amount, status, settled_at)
                 VALUES ($1, $2, 'settled', NOW())",
            )
            .bind(booking_id)
            .bind(booking.total_amount)
            .execute(&mut *tx)
            .await?;
        } else {
            return Err(AppError::Validation(format!(
                "booking {booking_id} has no refund to settle"
            )));
        }
    }

    release_claims(&mut tx, booking_id).await?;
    let booking = set_status(&mut tx, booking_id, BookingStatus::Refunded).await?;
    tx.commit().await?;

    info!(booking_id, "refund settled");
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaymentConfig {
        PaymentConfig {
            merchant_id: "cinema-main".to_string(),
            merchant_password: "s3cret".to_string(),
        }
    }

    #[test]
    fn token_is_deterministic() {
        let a = payment_token(&config(), 42, 1500, "pay-abc");
        let b = payment_token(&config(), 42, 1500, "pay-abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn token_changes_with_any_input() {
        let base = payment_token(&config(), 42, 1500, "pay-abc");
        assert_ne!(base, payment_token(&config(), 43, 1500, "pay-abc"));
        assert_ne!(base, payment_token(&config(), 42, 1501, "pay-abc"));
        assert_ne!(base, payment_token(&config(), 42, 1500, "pay-abd"));
        let other = PaymentConfig {
            merchant_password: "other".to_string(),
            ..config()
        };
        assert_ne!(base, payment_token(&other, 42, 1500, "pay-abc"));
    }

    #[test]
    fn cutoff_boundaries() {
        let show = Utc::now() + Duration::minutes(60);
        assert!(cancellation_open(show, 30, Utc::now()));
        assert!(!cancellation_open(show, 90, Utc::now()));
        // exactly at the cutoff instant counts as closed
        let now = show - Duration::minutes(30);
        assert!(!cancellation_open(show, 30, now));
        // zero-cutoff policy: open right up to showtime
        assert!(cancellation_open(show, 0, show - Duration::seconds(1)));
        assert!(!cancellation_open(show, 0, show));
    }
}
