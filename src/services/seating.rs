//! Hall seat-layout generation.
//!
//! Partitions a hall's seat count into rows and assigns seat classes by
//! front-to-back priority: vip rows first, then recliner, then basic. Class
//! boundaries can fall mid-row when counts don't divide evenly by row width.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Seat, SeatClass};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClassCounts {
    pub basic: u32,
    pub recliner: u32,
    pub vip: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SeatConfiguration {
    #[validate(range(min = 1))]
    pub total_seats: u32,
    #[validate(range(min = 1))]
    pub seats_per_row: u32,
    pub classes: ClassCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSeat {
    pub row_label: String,
    pub number: i32,
    pub class: SeatClass,
}

/// Highest addressable row index: A..Z then AA..ZZ gives 26 + 26*26 labels.
pub const MAX_ROWS: u32 = 26 + 26 * 26;

/// Row label for a zero-based row index: A..Z, then AA, AB, .. AZ, BA.
/// Two-letter continuation, not positional base-26: row 26 is "AA".
/// Callers must stay below `MAX_ROWS`; `plan_layout` enforces it.
pub fn row_label(index: u32) -> String {
    if index < 26 {
        ((b'A' + index as u8) as char).to_string()
    } else {
        let n = index - 26;
        let first = (b'A' + (n / 26) as u8) as char;
        let second = (b'A' + (n % 26) as u8) as char;
        format!("{first}{second}")
    }
}

/// Computes the full layout without touching storage. Fails when the class
/// counts don't sum to the seat total; never truncates or pads.
pub fn plan_layout(cfg: &SeatConfiguration) -> AppResult<Vec<PlannedSeat>> {
    let ClassCounts { basic, recliner, vip } = cfg.classes;
    let sum = basic + recliner + vip;
    if sum != cfg.total_seats {
        return Err(AppError::Validation(format!(
            "seat class counts sum to {sum} but total_seats is {}",
            cfg.total_seats
        )));
    }

    let rows_needed = cfg.total_seats.div_ceil(cfg.seats_per_row);
    if rows_needed > MAX_ROWS {
        return Err(AppError::Validation(format!(
            "layout needs {rows_needed} rows; at most {MAX_ROWS} (rows A through ZZ) fit"
        )));
    }

    let mut remaining_vip = vip;
    let mut remaining_recliner = recliner;
    let mut remaining_basic = basic;

    let mut seats = Vec::with_capacity(cfg.total_seats as usize);
    for idx in 0..cfg.total_seats {
        let row = idx / cfg.seats_per_row;
        let number = (idx % cfg.seats_per_row) as i32 + 1;
        // Greedy consumption, seat by seat: vip first, then recliner, then
        // basic. Front rows end up vip purely because they're filled first.
        let class = if remaining_vip > 0 {
            remaining_vip -= 1;
            SeatClass::Vip
        } else if remaining_recliner > 0 {
            remaining_recliner -= 1;
            SeatClass::Recliner
        } else {
            remaining_basic -= 1;
            SeatClass::Basic
        };
        seats.push(PlannedSeat {
            row_label: row_label(row),
            number,
            class,
        });
    }
    Ok(seats)
}

/// Replaces the hall's layout inside one transaction and updates its
/// capacity. A hall whose seats carry live claims cannot be regenerated.
/// Any failure leaves the previous layout untouched.
pub async fn generate_seats(
    pool: &PgPool,
    hall_id: i64,
    cfg: &SeatConfiguration,
) -> AppResult<Vec<Seat>> {
    cfg.validate()?;
    let planned = plan_layout(cfg)?;

    let mut tx = pool.begin().await?;

    let hall: Option<i64> = sqlx::query_scalar("SELECT id FROM halls WHERE id = $1 FOR UPDATE")
        .bind(hall_id)
        .fetch_optional(&mut *tx)
        .await?;
    if hall.is_none() {
        return Err(AppError::NotFound(format!("hall {hall_id}")));
    }

    let has_live_claims: bool = sqlx::query_scalar(
        "SELECT EXISTS(
           SELECT 1 FROM booking_seats bs
           JOIN seats s ON s.id = bs.seat_id
           WHERE s.hall_id = $1 AND bs.active
         )",
    )
    .bind(hall_id)
    .fetch_one(&mut *tx)
    .await?;
    if has_live_claims {
        return Err(AppError::Validation(
            "hall has live bookings; layout cannot be replaced".to_string(),
        ));
    }

    // Released claims (failed/cancelled/refunded bookings) are inert but
    // still reference seat rows; purge them first or the seat delete trips
    // the foreign key. Deleting a released claim is an allowed release
    // representation, and live claims were rejected above.
    sqlx::query(
        "DELETE FROM booking_seats bs
         USING seats s
         WHERE bs.seat_id = s.id AND s.hall_id = $1 AND NOT bs.active",
    )
    .bind(hall_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM seats WHERE hall_id = $1")
        .bind(hall_id)
        .execute(&mut *tx)
        .await?;

    let rows: Vec<String> = planned.iter().map(|s| s.row_label.clone()).collect();
    let numbers: Vec<i32> = planned.iter().map(|s| s.number).collect();
    let classes: Vec<SeatClass> = planned.iter().map(|s| s.class).collect();

    let seats: Vec<Seat> = sqlx::query_as(
        "INSERT INTO seats (hall_id, row_label, number, class)
         SELECT $1, r, n, c
         FROM UNNEST($2::text[], $3::int[], $4::seat_class[]) AS t(r, n, c)
         RETURNING id, hall_id, row_label, number, class",
    )
    .bind(hall_id)
    .bind(&rows)
    .bind(&numbers)
    .bind(&classes)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query("UPDATE halls SET capacity = $2 WHERE id = $1")
        .bind(hall_id)
        .bind(seats.len() as i32)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("generated {} seats for hall {}", seats.len(), hall_id);
    Ok(seats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg(total: u32, per_row: u32, basic: u32, recliner: u32, vip: u32) -> SeatConfiguration {
        SeatConfiguration {
            total_seats: total,
            seats_per_row: per_row,
            classes: ClassCounts { basic, recliner, vip },
        }
    }

    #[test]
    fn row_labels_continue_with_two_letters() {
        assert_eq!(row_label(0), "A");
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
        assert_eq!(row_label(27), "AB");
        assert_eq!(row_label(51), "AZ");
        assert_eq!(row_label(52), "BA");
        assert_eq!(row_label(MAX_ROWS - 1), "ZZ");
    }

    #[test]
    fn layouts_past_the_label_space_are_rejected() {
        // 703 single-seat rows would need a label after ZZ
        let err = plan_layout(&cfg(703, 1, 703, 0, 0)).unwrap_err();
        match err {
            crate::error::AppError::Validation(msg) => assert!(msg.contains("703")),
            other => panic!("expected validation error, got {other:?}"),
        }
        // the full label space itself is fine
        assert!(plan_layout(&cfg(702, 1, 702, 0, 0)).is_ok());
    }

    #[test]
    fn even_split_gives_one_class_per_row() {
        let seats = plan_layout(&cfg(30, 10, 10, 10, 10)).unwrap();
        assert_eq!(seats.len(), 30);
        for seat in &seats[..10] {
            assert_eq!(seat.row_label, "A");
            assert_eq!(seat.class, SeatClass::Vip);
        }
        for seat in &seats[10..20] {
            assert_eq!(seat.row_label, "B");
            assert_eq!(seat.class, SeatClass::Recliner);
        }
        for seat in &seats[20..30] {
            assert_eq!(seat.row_label, "C");
            assert_eq!(seat.class, SeatClass::Basic);
        }
    }

    #[test]
    fn short_last_row_and_exhausted_vip() {
        // 25 seats, 10 per row: rows A and B full, C holds the remaining 5.
        let seats = plan_layout(&cfg(25, 10, 5, 10, 10)).unwrap();
        assert_eq!(seats.len(), 25);
        assert!(seats[..10].iter().all(|s| s.class == SeatClass::Vip));
        assert!(seats[10..20].iter().all(|s| s.class == SeatClass::Recliner));
        let last_row: Vec<_> = seats[20..].iter().collect();
        assert_eq!(last_row.len(), 5);
        assert!(last_row.iter().all(|s| s.row_label == "C"));
        assert!(last_row.iter().all(|s| s.class == SeatClass::Basic));
        assert_eq!(last_row.last().unwrap().number, 5);
    }

    #[test]
    fn class_boundary_falls_mid_row() {
        // 12 vip in 10-wide rows: row B starts with 2 vip, then recliner.
        let seats = plan_layout(&cfg(30, 10, 8, 10, 12)).unwrap();
        assert_eq!(seats[11].row_label, "B");
        assert_eq!(seats[11].class, SeatClass::Vip);
        assert_eq!(seats[12].class, SeatClass::Recliner);
        assert_eq!(seats[21].class, SeatClass::Recliner);
        assert_eq!(seats[22].class, SeatClass::Basic);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let err = plan_layout(&cfg(100, 10, 40, 30, 20)).unwrap_err();
        match err {
            crate::error::AppError::Validation(msg) => {
                assert!(msg.contains("90"));
                assert!(msg.contains("100"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn layout_preserves_counts_and_numbering(
            per_row in 1u32..30,
            basic in 0u32..120,
            recliner in 0u32..120,
            vip in 0u32..120,
        ) {
            let total = basic + recliner + vip;
            prop_assume!(total > 0);
            let seats = plan_layout(&cfg(total, per_row, basic, recliner, vip)).unwrap();

            prop_assert_eq!(seats.len() as u32, total);
            let count = |c: SeatClass| seats.iter().filter(|s| s.class == c).count() as u32;
            prop_assert_eq!(count(SeatClass::Basic), basic);
            prop_assert_eq!(count(SeatClass::Recliner), recliner);
            prop_assert_eq!(count(SeatClass::Vip), vip);

            // 1-based numbering, never wider than the row width
            for (idx, seat) in seats.iter().enumerate() {
                let expected = (idx as u32 % per_row) as i32 + 1;
                prop_assert_eq!(seat.number, expected);
                prop_assert!(seat.number as u32 <= per_row);
            }
        }
    }
}
