use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A unit of capacity. Seat numbers of a section always form `1..=capacity`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub section_id: i64,
    pub seat_number: i32,
}
