//! Notification collaborator boundary. Ticket email / QR delivery live
//! behind this trait; a delivery failure must never fail a booking
//! transaction, so callers log and move on.

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking_id: i64) -> anyhow::Result<()>;
    async fn refund_requested(&self, booking_id: i64, amount: i64) -> anyhow::Result<()>;
}

/// Default collaborator: structured log lines only. The real delivery
/// pipeline subscribes to these downstream.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, booking_id: i64) -> anyhow::Result<()> {
        tracing::info!(booking_id, "booking confirmed");
        Ok(())
    }

    async fn refund_requested(&self, booking_id: i64, amount: i64) -> anyhow::Result<()> {
        tracing::info!(booking_id, amount, "refund requested");
        Ok(())
    }
}
