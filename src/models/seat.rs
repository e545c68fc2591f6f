use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Seat tier; determines layout priority (vip rows first) and price tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatClass {
    Basic,
    Recliner,
    Vip,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Basic => "basic",
            SeatClass::Recliner => "recliner",
            SeatClass::Vip => "vip",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub hall_id: i64,
    pub row_label: String,
    pub number: i32,
    pub class: SeatClass,
}
