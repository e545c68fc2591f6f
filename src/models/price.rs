use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SeatClass;

/// Per-show price for one seat class. Amounts are minor currency units.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Price {
    pub id: i64,
    pub show_id: i64,
    pub class: SeatClass,
    pub amount: i64,
}
