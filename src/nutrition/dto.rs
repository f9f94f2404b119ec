use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub user_id: Uuid,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct NutritionStatusResponse {
    pub status: &'static str,
    pub total_kcal: Decimal,
    pub total_carbs: Decimal,
    pub total_protein: Decimal,
    pub total_fat: Decimal,
    pub rec_kcal: Decimal,
    pub rec_carbs: Decimal,
    pub rec_protein: Decimal,
    pub rec_fat: Decimal,
    pub condition: bool,
}

#[derive(Debug, Serialize)]
pub struct MealItem {
    pub meal_type: String,
    pub food_name: String,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MealHistoryResponse {
    pub status: &'static str,
    pub meals: Vec<MealItem>,
}
