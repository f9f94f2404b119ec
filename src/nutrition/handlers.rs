use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::{macros::format_description, Date};
use tracing::instrument;

use crate::{catalog::PgCatalog, error::ApiError, state::AppState, users::UserProfile};

use super::dto::{DayQuery, MealHistoryResponse, MealItem, NutritionStatusResponse};
use super::services::{self, round_amount};
use super::store::PgNutritionStore;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/nutrition/status", get(nutrition_status))
        .route("/nutrition/meals", get(meal_history))
}

fn parse_day(raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| ApiError::InvalidDate)
}

#[instrument(skip(state))]
pub async fn nutrition_status(
    State(state): State<AppState>,
    Query(q): Query<DayQuery>,
) -> Result<Json<NutritionStatusResponse>, ApiError> {
    let day = parse_day(&q.date)?;
    let profile = UserProfile::find_by_id(&state.db, q.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let store = PgNutritionStore::new(state.db.clone());
    let (total, rec, condition) =
        services::nutrition_status(&store, &store, state.recommender.as_ref(), &profile, day)
            .await?;

    Ok(Json(NutritionStatusResponse {
        status: "success",
        total_kcal: round_amount(total.kcal),
        total_carbs: round_amount(total.carbs),
        total_protein: round_amount(total.protein),
        total_fat: round_amount(total.fat),
        rec_kcal: round_amount(rec.kcal),
        rec_carbs: round_amount(rec.carbs),
        rec_protein: round_amount(rec.protein),
        rec_fat: round_amount(rec.fat),
        condition,
    }))
}

#[instrument(skip(state))]
pub async fn meal_history(
    State(state): State<AppState>,
    Query(q): Query<DayQuery>,
) -> Result<Json<MealHistoryResponse>, ApiError> {
    let day = parse_day(&q.date)?;
    let profile = UserProfile::find_by_id(&state.db, q.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let store = PgNutritionStore::new(state.db.clone());
    let catalog = PgCatalog::new(state.db.clone());
    let meals = services::meal_history(
        &store,
        &store,
        &store,
        &catalog,
        state.recommender.as_ref(),
        &profile,
        day,
    )
    .await?;

    Ok(Json(MealHistoryResponse {
        status: "success",
        meals: meals
            .into_iter()
            .map(|m| MealItem {
                meal_type: m.meal_type,
                food_name: m.food_name,
                kcal: round_amount(m.kcal),
                carbs: round_amount(m.carbs),
                protein: round_amount(m.protein),
                fat: round_amount(m.fat),
            })
            .collect(),
    }))
}
