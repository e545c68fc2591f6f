//! Per-show pricing: one amount per (show, seat class).

use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;
use tracing::info;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Price, SeatClass};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PriceEntry {
    pub class: SeatClass,
    #[validate(range(min = 0))]
    pub amount: i64,
}

/// Full price set for a show, keyed by class; an absent key means the class
/// is not yet priced. Takes any executor so the reservation transaction can
/// resolve prices inside its own transaction.
pub async fn price_map<'e, E>(executor: E, show_id: i64) -> AppResult<HashMap<SeatClass, i64>>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(SeatClass, i64)> =
        sqlx::query_as("SELECT class, amount FROM prices WHERE show_id = $1")
            .bind(show_id)
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().collect())
}

/// Replaces the show's whole price set atomically (delete-then-insert in one
/// transaction). On failure the prior full set survives; a half-updated set
/// is never observable.
pub async fn set_prices(
    pool: &PgPool,
    show_id: i64,
    entries: &[PriceEntry],
) -> AppResult<Vec<Price>> {
    for entry in entries {
        entry.validate()?;
    }
    let mut seen: Vec<SeatClass> = Vec::new();
    for entry in entries {
        if seen.contains(&entry.class) {
            return Err(AppError::Validation(format!(
                "duplicate price entry for class {}",
                entry.class.as_str()
            )));
        }
        seen.push(entry.class);
    }

    let mut tx = pool.begin().await?;

    let show: Option<i64> = sqlx::query_scalar("SELECT id FROM shows WHERE id = $1")
        .bind(show_id)
        .fetch_optional(&mut *tx)
        .await?;
    if show.is_none() {
        return Err(AppError::NotFound(format!("show {show_id}")));
    }

    sqlx::query("DELETE FROM prices WHERE show_id = $1")
        .bind(show_id)
        .execute(&mut *tx)
        .await?;

    let mut prices = Vec::with_capacity(entries.len());
    for entry in entries {
        let price: Price = sqlx::query_as(
            "INSERT INTO prices (show_id, class, amount)
             VALUES ($1, $2, $3)
             RETURNING id, show_id, class, amount",
        )
        .bind(show_id)
        .bind(entry.class)
        .bind(entry.amount)
        .fetch_one(&mut *tx)
        .await?;
        prices.push(price);
    }

    tx.commit().await?;
    info!("replaced {} price entries for show {}", prices.len(), show_id);
    Ok(prices)
}

/// Removes a single class price.
pub async fn delete_price(pool: &PgPool, price_id: i64) -> AppResult<()> {
    let deleted = sqlx::query("DELETE FROM prices WHERE id = $1")
        .bind(price_id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!("price {price_id}")));
    }
    Ok(())
}
