use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a booking.
///
/// `pending -> {paid, failed, cancelled}`, `paid -> {cancelled, refunded}`.
/// A cancelled booking has no unconditional outgoing edge: only a
/// cancelled-after-payment booking moves to `refunded`, and the settlement
/// service admits that transition solely against a recorded refund
/// obligation. A never-paid cancellation is terminal. Only `pending` and
/// `paid` hold seat inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    /// States whose seat claims count toward the exclusivity invariant.
    pub fn is_live(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Paid)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
                | (Paid, Refunded)
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub show_id: i64,
    pub status: BookingStatus,
    pub total_amount: i64,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;

    #[test]
    fn live_states_hold_inventory() {
        assert!(Pending.is_live());
        assert!(Paid.is_live());
        assert!(!Failed.is_live());
        assert!(!Cancelled.is_live());
        assert!(!Refunded.is_live());
    }

    #[test]
    fn no_transitions_out_of_terminal_states() {
        for terminal in [Failed, Cancelled, Refunded] {
            for next in [Pending, Paid, Failed, Cancelled, Refunded] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn never_paid_cancellation_cannot_reach_refunded() {
        // refund settlement for a cancelled booking goes through the
        // refund-obligation check in settlement, never through this table
        assert!(!Cancelled.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Paid));
    }

    #[test]
    fn pending_and_paid_transitions() {
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Paid.can_transition_to(Failed));
    }
}
