use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct FoodFact {
    pub id: Uuid,
    pub name: String,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MealTypeFact {
    pub id: Uuid,
    pub name: String,
}

/// Read-only reference data. A missing id resolves to `None`, never an error.
#[async_trait]
pub trait NutritionCatalog: Send + Sync {
    async fn resolve_food(&self, food_id: Uuid) -> anyhow::Result<Option<FoodFact>>;
    async fn resolve_meal_type(&self, meal_type_id: Uuid) -> anyhow::Result<Option<MealTypeFact>>;
}

#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NutritionCatalog for PgCatalog {
    async fn resolve_food(&self, food_id: Uuid) -> anyhow::Result<Option<FoodFact>> {
        let food = sqlx::query_as::<_, FoodFact>(
            r#"
            SELECT id, name, kcal, carbs, protein, fat
            FROM foods
            WHERE id = $1
            "#,
        )
        .bind(food_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(food)
    }

    async fn resolve_meal_type(&self, meal_type_id: Uuid) -> anyhow::Result<Option<MealTypeFact>> {
        let meal_type = sqlx::query_as::<_, MealTypeFact>(
            r#"
            SELECT id, name
            FROM meal_types
            WHERE id = $1
            "#,
        )
        .bind(meal_type_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(meal_type)
    }
}
