use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Cached per-user intake target. One row per user, `user_id` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Recommendation {
    pub user_id: Uuid,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

/// Running sums for one `(user, day)` key plus the derived condition flag and
/// the meal records folded into the sums. Sums stay unrounded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DailyTotal {
    pub user_id: Uuid,
    pub day: Date,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
    pub condition: bool,
    pub meal_record_ids: Vec<Uuid>,
}

impl DailyTotal {
    pub fn zero(user_id: Uuid, day: Date) -> Self {
        Self {
            user_id,
            day,
            kcal: Decimal::ZERO,
            carbs: Decimal::ZERO,
            protein: Decimal::ZERO,
            fat: Decimal::ZERO,
            condition: false,
            meal_record_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Uuid,
    pub meal_type_id: Uuid,
    pub eaten_at: OffsetDateTime,
}
