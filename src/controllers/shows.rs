use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::Show;
use crate::services::{availability, pricing, pricing::PriceEntry};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows", post(create_show))
        .route("/shows/{id}/seats", get(get_show_seats))
        .route("/shows/{id}/prices", post(set_show_prices))
        .route("/prices/{id}", delete(delete_price))
}

fn require_admin(user: &AuthUser) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::Authorization("admin access required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
struct CreateShowRequest {
    movie_id: i64,
    hall_id: i64,
    starts_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 16))]
    language: String,
}

// POST /api/shows
async fn create_show(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateShowRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    req.validate()?;

    let movie: Option<i64> = sqlx::query_scalar("SELECT id FROM movies WHERE id = $1")
        .bind(req.movie_id)
        .fetch_optional(&state.db.pool)
        .await?;
    if movie.is_none() {
        return Err(AppError::NotFound(format!("movie {}", req.movie_id)));
    }
    let hall: Option<i64> = sqlx::query_scalar("SELECT id FROM halls WHERE id = $1")
        .bind(req.hall_id)
        .fetch_optional(&state.db.pool)
        .await?;
    if hall.is_none() {
        return Err(AppError::NotFound(format!("hall {}", req.hall_id)));
    }

    let show: Show = sqlx::query_as(
        "INSERT INTO shows (movie_id, hall_id, starts_at, language)
         VALUES ($1, $2, $3, $4)
         RETURNING id, movie_id, hall_id, starts_at, language",
    )
    .bind(req.movie_id)
    .bind(req.hall_id)
    .bind(req.starts_at)
    .bind(&req.language)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(show)))
}

// GET /api/shows/{id}/seats
async fn get_show_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let seat_map = availability::get_availability(&state.db.pool, show_id).await?;
    Ok((StatusCode::OK, Json(seat_map)))
}

#[derive(Debug, Deserialize)]
struct SetPricesRequest {
    prices: Vec<PriceEntry>,
}

// POST /api/shows/{id}/prices
async fn set_show_prices(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(show_id): Path<i64>,
    Json(req): Json<SetPricesRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;

    let prices = pricing::set_prices(&state.db.pool, show_id, &req.prices).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "prices": prices })),
    ))
}

// DELETE /api/prices/{id}
async fn delete_price(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(price_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;

    pricing::delete_price(&state.db.pool, price_id).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
