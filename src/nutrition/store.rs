use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{DailyTotal, MealRecord, Recommendation};

/// Per-user recommendation cache. `insert_or_fetch` must be atomic: when two
/// writers race on the same user, the loser receives the winner's row.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<Recommendation>>;
    async fn insert_or_fetch(&self, rec: Recommendation) -> anyhow::Result<Recommendation>;
}

#[async_trait]
pub trait DailyTotalStore: Send + Sync {
    async fn find(&self, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailyTotal>>;
    /// Same conflict contract as the recommendation cache, keyed on
    /// `(user_id, day)`.
    async fn insert_or_fetch(&self, total: DailyTotal) -> anyhow::Result<DailyTotal>;
    /// Writes the four sums and the condition flag in one statement; a
    /// concurrent reader never observes a partially updated row.
    async fn update(&self, total: &DailyTotal) -> anyhow::Result<()>;
}

#[async_trait]
pub trait MealRecordStore: Send + Sync {
    /// Missing ids are simply absent from the result, in no particular order.
    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<MealRecord>>;
}

#[derive(Clone)]
pub struct PgNutritionStore {
    db: PgPool,
}

impl PgNutritionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecommendationStore for PgNutritionStore {
    async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<Recommendation>> {
        let rec = sqlx::query_as::<_, Recommendation>(
            r#"
            SELECT user_id, kcal, carbs, protein, fat
            FROM recommendations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(rec)
    }

    async fn insert_or_fetch(&self, rec: Recommendation) -> anyhow::Result<Recommendation> {
        // The no-op DO UPDATE makes RETURNING yield the existing row when a
        // concurrent insert won the race.
        let row = sqlx::query_as::<_, Recommendation>(
            r#"
            INSERT INTO recommendations (user_id, kcal, carbs, protein, fat)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, kcal, carbs, protein, fat
            "#,
        )
        .bind(rec.user_id)
        .bind(rec.kcal)
        .bind(rec.carbs)
        .bind(rec.protein)
        .bind(rec.fat)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl DailyTotalStore for PgNutritionStore {
    async fn find(&self, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailyTotal>> {
        let total = sqlx::query_as::<_, DailyTotal>(
            r#"
            SELECT user_id, day, kcal, carbs, protein, fat, condition, meal_record_ids
            FROM daily_totals
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.db)
        .await?;
        Ok(total)
    }

    async fn insert_or_fetch(&self, total: DailyTotal) -> anyhow::Result<DailyTotal> {
        let row = sqlx::query_as::<_, DailyTotal>(
            r#"
            INSERT INTO daily_totals (user_id, day, kcal, carbs, protein, fat, condition, meal_record_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, day) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, day, kcal, carbs, protein, fat, condition, meal_record_ids
            "#,
        )
        .bind(total.user_id)
        .bind(total.day)
        .bind(total.kcal)
        .bind(total.carbs)
        .bind(total.protein)
        .bind(total.fat)
        .bind(total.condition)
        .bind(&total.meal_record_ids)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, total: &DailyTotal) -> anyhow::Result<()> {
        // meal_record_ids is deliberately untouched: unresolvable ids stay
        // listed and get retried on the next recompute.
        sqlx::query(
            r#"
            UPDATE daily_totals
            SET kcal = $3, carbs = $4, protein = $5, fat = $6, condition = $7, updated_at = now()
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(total.user_id)
        .bind(total.day)
        .bind(total.kcal)
        .bind(total.carbs)
        .bind(total.protein)
        .bind(total.fat)
        .bind(total.condition)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MealRecordStore for PgNutritionStore {
    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<MealRecord>> {
        let records = sqlx::query_as::<_, MealRecord>(
            r#"
            SELECT id, user_id, food_id, meal_type_id, eaten_at
            FROM meal_records
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(records)
    }
}
