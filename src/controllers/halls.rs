use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Hall, Seat};
use crate::services::seating::{self, SeatConfiguration};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/halls", post(create_hall))
        .route("/halls/{id}/seats", post(generate_seats))
        .route("/halls/{id}/seats", get(get_hall_seats))
}

fn require_admin(user: &AuthUser) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::Authorization("admin access required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
struct CreateHallRequest {
    theater_id: i64,
    #[validate(length(min = 1, max = 120))]
    name: String,
}

// POST /api/halls
async fn create_hall(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateHallRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    req.validate()?;

    let theater: Option<i64> = sqlx::query_scalar("SELECT id FROM theaters WHERE id = $1")
        .bind(req.theater_id)
        .fetch_optional(&state.db.pool)
        .await?;
    if theater.is_none() {
        return Err(AppError::NotFound(format!("theater {}", req.theater_id)));
    }

    let hall: Hall = sqlx::query_as(
        "INSERT INTO halls (theater_id, name)
         VALUES ($1, $2)
         RETURNING id, theater_id, name, capacity",
    )
    .bind(req.theater_id)
    .bind(&req.name)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(hall)))
}

// POST /api/halls/{id}/seats
async fn generate_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(hall_id): Path<i64>,
    Json(cfg): Json<SeatConfiguration>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;

    let seats = seating::generate_seats(&state.db.pool, hall_id, &cfg).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "hall_id": hall_id,
            "capacity": seats.len(),
            "seats": seats,
        })),
    ))
}

// GET /api/halls/{id}/seats
async fn get_hall_seats(
    State(state): State<Arc<AppState>>,
    Path(hall_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let hall: Option<i64> = sqlx::query_scalar("SELECT id FROM halls WHERE id = $1")
        .bind(hall_id)
        .fetch_optional(&state.db.pool)
        .await?;
    if hall.is_none() {
        return Err(AppError::NotFound(format!("hall {hall_id}")));
    }

    let seats: Vec<Seat> = sqlx::query_as(
        "SELECT id, hall_id, row_label, number, class
         FROM seats WHERE hall_id = $1
         ORDER BY id",
    )
    .bind(hall_id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok((StatusCode::OK, Json(seats)))
}
