use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::services::settlement;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/payments/verify", post(verify_payment))
}

#[derive(Debug, Deserialize)]
struct VerifyPaymentRequest {
    booking_id: i64,
    status: String,
    payment_ref: Option<String>,
    token: Option<String>,
}

// POST /api/payments/verify
//
// Settlement webhook from the payment gateway. Authenticity comes from the
// SHA-256 token, not from user credentials, so this route has no AuthUser.
async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!(
        booking_id = req.booking_id,
        status = %req.status,
        "payment webhook received"
    );

    let booking = match req.status.as_str() {
        "CONFIRMED" => {
            let payment_ref = req.payment_ref.ok_or_else(|| {
                AppError::Validation("payment_ref is required for CONFIRMED".to_string())
            })?;
            let token = req.token.ok_or_else(|| {
                AppError::Validation("token is required for CONFIRMED".to_string())
            })?;
            settlement::confirm_payment(
                &state.db.pool,
                &state.config.payment,
                state.notifier.as_ref(),
                req.booking_id,
                &payment_ref,
                &token,
            )
            .await?
        }
        "CANCELLED" | "FAILED" | "REJECTED" => {
            settlement::fail_payment(&state.db.pool, req.booking_id).await?
        }
        "REFUNDED" => settlement::confirm_refund(&state.db.pool, req.booking_id).await?,
        other => {
            return Err(AppError::Validation(format!(
                "unknown payment status '{other}'"
            )));
        }
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "received": true,
            "booking_id": booking.id,
            "booking_status": booking.status,
        })),
    ))
}
