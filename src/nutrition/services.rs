use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use time::Date;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::NutritionCatalog;
use crate::error::ApiError;
use crate::recommend::RecommendationEngine;
use crate::users::UserProfile;

use super::repo_types::{DailyTotal, MealRecord, Recommendation};
use super::store::{DailyTotalStore, MealRecordStore, RecommendationStore};

/// One resolved meal: reference data joined onto a meal record.
#[derive(Debug, Clone, PartialEq)]
pub struct MealLine {
    pub meal_type: String,
    pub food_name: String,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

#[derive(Debug)]
pub struct AggregatedDay {
    pub meals: Vec<MealLine>,
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

/// Cached recommendation for the user, computed and persisted on first
/// demand. An engine failure aborts the request before anything is written.
pub async fn recommendation_for(
    store: &dyn RecommendationStore,
    engine: &dyn RecommendationEngine,
    profile: &UserProfile,
) -> Result<Recommendation, ApiError> {
    if let Some(existing) = store.find(profile.id).await? {
        return Ok(existing);
    }
    let intake = engine.compute(profile)?;
    debug!(user_id = %profile.id, "recommendation computed, caching");
    let rec = store
        .insert_or_fetch(Recommendation {
            user_id: profile.id,
            kcal: intake.kcal,
            carbs: intake.carbs,
            protein: intake.protein,
            fat: intake.fat,
        })
        .await?;
    Ok(rec)
}

/// Running-totals row for `(user, day)`, created zeroed on first access.
/// A lost insert race comes back with the winner's row.
pub async fn daily_total_for(
    store: &dyn DailyTotalStore,
    user_id: Uuid,
    day: Date,
) -> Result<DailyTotal, ApiError> {
    if let Some(total) = store.find(user_id, day).await? {
        return Ok(total);
    }
    let total = store.insert_or_fetch(DailyTotal::zero(user_id, day)).await?;
    Ok(total)
}

/// Strict comparison: hitting the target exactly is still within it.
pub fn exceeds_recommendation(total: &DailyTotal, rec: &Recommendation) -> bool {
    total.kcal > rec.kcal
}

/// Response-boundary rounding: two decimals, half-up. Stored values stay
/// unrounded so repeated aggregation is not lossy.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Skip policy: a record whose food or meal type is missing from the catalog
/// yields `None` and is excluded from both the meal list and the sums.
/// Catalog transport failures still propagate.
async fn resolve_record(
    catalog: &dyn NutritionCatalog,
    record: &MealRecord,
) -> Result<Option<MealLine>, ApiError> {
    let Some(food) = catalog.resolve_food(record.food_id).await? else {
        warn!(record_id = %record.id, food_id = %record.food_id, "food not in catalog, skipping record");
        return Ok(None);
    };
    let Some(meal_type) = catalog.resolve_meal_type(record.meal_type_id).await? else {
        warn!(record_id = %record.id, meal_type_id = %record.meal_type_id, "meal type not in catalog, skipping record");
        return Ok(None);
    };
    Ok(Some(MealLine {
        meal_type: meal_type.name,
        food_name: food.name,
        kcal: food.kcal,
        carbs: food.carbs,
        protein: food.protein,
        fat: food.fat,
    }))
}

/// Resolves each record against the catalog and sums nutrients exactly, in
/// record order. Unresolvable records are skipped per `resolve_record`;
/// zero resolvable records is `NoMealsFound`.
pub async fn aggregate_meals(
    catalog: &dyn NutritionCatalog,
    records: &[MealRecord],
) -> Result<AggregatedDay, ApiError> {
    if records.is_empty() {
        return Err(ApiError::NoMealsFound);
    }

    let mut meals = Vec::with_capacity(records.len());
    let mut kcal = Decimal::ZERO;
    let mut carbs = Decimal::ZERO;
    let mut protein = Decimal::ZERO;
    let mut fat = Decimal::ZERO;

    for record in records {
        let Some(line) = resolve_record(catalog, record).await? else {
            continue;
        };
        kcal += line.kcal;
        carbs += line.carbs;
        protein += line.protein;
        fat += line.fat;
        meals.push(line);
    }

    if meals.is_empty() {
        return Err(ApiError::NoMealsFound);
    }

    Ok(AggregatedDay {
        meals,
        kcal,
        carbs,
        protein,
        fat,
    })
}

/// "Today's status": the recommendation gates everything, then the totals
/// row, then the derived flag. Read-only; the stored flag is refreshed only
/// together with a totals refresh.
pub async fn nutrition_status(
    rec_store: &dyn RecommendationStore,
    total_store: &dyn DailyTotalStore,
    engine: &dyn RecommendationEngine,
    profile: &UserProfile,
    day: Date,
) -> Result<(DailyTotal, Recommendation, bool), ApiError> {
    let rec = recommendation_for(rec_store, engine, profile).await?;
    let total = daily_total_for(total_store, profile.id, day).await?;
    let condition = exceeds_recommendation(&total, &rec);
    Ok((total, rec, condition))
}

/// "Today's meals": re-derives the day's sums from the catalog and writes
/// them back, with the condition refreshed in the same update. Ids that do
/// not resolve stay in the stored list and are retried on the next recompute.
pub async fn meal_history(
    rec_store: &dyn RecommendationStore,
    total_store: &dyn DailyTotalStore,
    record_store: &dyn MealRecordStore,
    catalog: &dyn NutritionCatalog,
    engine: &dyn RecommendationEngine,
    profile: &UserProfile,
    day: Date,
) -> Result<Vec<MealLine>, ApiError> {
    let mut total = total_store
        .find(profile.id, day)
        .await?
        .ok_or(ApiError::DayNotFound)?;

    let records = record_store.find_many(&total.meal_record_ids).await?;
    // find_many gives no ordering guarantee; emit in stored id order.
    let mut by_id: HashMap<Uuid, MealRecord> =
        records.into_iter().map(|r| (r.id, r)).collect();
    let ordered: Vec<MealRecord> = total
        .meal_record_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();

    let aggregated = aggregate_meals(catalog, &ordered).await?;

    let rec = recommendation_for(rec_store, engine, profile).await?;
    total.kcal = aggregated.kcal;
    total.carbs = aggregated.carbs;
    total.protein = aggregated.protein;
    total.fat = aggregated.fat;
    total.condition = exceeds_recommendation(&total, &rec);
    total_store.update(&total).await?;

    Ok(aggregated.meals)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::OffsetDateTime;

    use crate::catalog::{FoodFact, MealTypeFact};
    use crate::recommend::{ComputeError, RecommendedIntake};
    use crate::users::GENDER_MALE;

    use super::*;

    #[derive(Default)]
    struct MemStore {
        recs: Mutex<HashMap<Uuid, Recommendation>>,
        totals: Mutex<HashMap<(Uuid, Date), DailyTotal>>,
        records: Mutex<HashMap<Uuid, MealRecord>>,
        rec_inserts: AtomicUsize,
        total_inserts: AtomicUsize,
    }

    #[async_trait]
    impl RecommendationStore for MemStore {
        async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<Recommendation>> {
            Ok(self.recs.lock().unwrap().get(&user_id).cloned())
        }

        async fn insert_or_fetch(&self, rec: Recommendation) -> anyhow::Result<Recommendation> {
            let mut recs = self.recs.lock().unwrap();
            if let Some(existing) = recs.get(&rec.user_id) {
                return Ok(existing.clone());
            }
            self.rec_inserts.fetch_add(1, Ordering::SeqCst);
            recs.insert(rec.user_id, rec.clone());
            Ok(rec)
        }
    }

    #[async_trait]
    impl DailyTotalStore for MemStore {
        async fn find(&self, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailyTotal>> {
            Ok(self.totals.lock().unwrap().get(&(user_id, day)).cloned())
        }

        async fn insert_or_fetch(&self, total: DailyTotal) -> anyhow::Result<DailyTotal> {
            let mut totals = self.totals.lock().unwrap();
            if let Some(existing) = totals.get(&(total.user_id, total.day)) {
                return Ok(existing.clone());
            }
            self.total_inserts.fetch_add(1, Ordering::SeqCst);
            totals.insert((total.user_id, total.day), total.clone());
            Ok(total)
        }

        async fn update(&self, total: &DailyTotal) -> anyhow::Result<()> {
            self.totals
                .lock()
                .unwrap()
                .insert((total.user_id, total.day), total.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl MealRecordStore for MemStore {
        async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<MealRecord>> {
            let records = self.records.lock().unwrap();
            let mut found: Vec<MealRecord> =
                ids.iter().filter_map(|id| records.get(id).cloned()).collect();
            // Deliberately scramble: callers must not rely on our order.
            found.reverse();
            Ok(found)
        }
    }

    #[derive(Default)]
    struct MemCatalog {
        foods: HashMap<Uuid, FoodFact>,
        meal_types: HashMap<Uuid, MealTypeFact>,
    }

    #[async_trait]
    impl NutritionCatalog for MemCatalog {
        async fn resolve_food(&self, food_id: Uuid) -> anyhow::Result<Option<FoodFact>> {
            Ok(self.foods.get(&food_id).cloned())
        }

        async fn resolve_meal_type(
            &self,
            meal_type_id: Uuid,
        ) -> anyhow::Result<Option<MealTypeFact>> {
            Ok(self.meal_types.get(&meal_type_id).cloned())
        }
    }

    struct FixedEngine {
        kcal: Decimal,
        computes: AtomicUsize,
    }

    impl FixedEngine {
        fn new(kcal: Decimal) -> Self {
            Self {
                kcal,
                computes: AtomicUsize::new(0),
            }
        }
    }

    impl RecommendationEngine for FixedEngine {
        fn compute(&self, _profile: &UserProfile) -> Result<RecommendedIntake, ComputeError> {
            self.computes.fetch_add(1, Ordering::SeqCst);
            Ok(RecommendedIntake {
                kcal: self.kcal,
                carbs: dec!(300),
                protein: dec!(150),
                fat: dec!(60),
            })
        }
    }

    struct FailingEngine;

    impl RecommendationEngine for FailingEngine {
        fn compute(&self, _profile: &UserProfile) -> Result<RecommendedIntake, ComputeError> {
            Err(ComputeError::IncompleteProfile("weight"))
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "tester@example.com".into(),
            nickname: "tester".into(),
            birthday: date!(1994 - 03 - 02),
            age: 30,
            gender: GENDER_MALE,
            height: dec!(175),
            weight: dec!(70),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn add_food(catalog: &mut MemCatalog, name: &str, kcal: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        catalog.foods.insert(
            id,
            FoodFact {
                id,
                name: name.into(),
                kcal,
                carbs: dec!(10),
                protein: dec!(5),
                fat: dec!(2),
            },
        );
        id
    }

    fn add_meal_type(catalog: &mut MemCatalog, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        catalog
            .meal_types
            .insert(id, MealTypeFact { id, name: name.into() });
        id
    }

    fn record(user_id: Uuid, food_id: Uuid, meal_type_id: Uuid) -> MealRecord {
        MealRecord {
            id: Uuid::new_v4(),
            user_id,
            food_id,
            meal_type_id,
            eaten_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn recommendation_cache_computes_once() {
        let store = MemStore::default();
        let engine = FixedEngine::new(dec!(2000));
        let p = profile();

        let first = recommendation_for(&store, &engine, &p).await.unwrap();
        let second = recommendation_for(&store, &engine, &p).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.rec_inserts.load(Ordering::SeqCst), 1);
        assert_eq!(engine.computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_computation_writes_nothing() {
        let store = MemStore::default();
        let p = profile();

        let err = recommendation_for(&store, &FailingEngine, &p)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RecommendationUnavailable(_)));
        assert!(store.recs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_access_creates_zero_row() {
        let store = MemStore::default();
        let user_id = Uuid::new_v4();
        let day = date!(2024 - 11 - 05);

        let total = daily_total_for(&store, user_id, day).await.unwrap();

        assert_eq!(total.kcal, dec!(0.00));
        assert_eq!(total.carbs, dec!(0.00));
        assert_eq!(total.protein, dec!(0.00));
        assert_eq!(total.fat, dec!(0.00));
        assert!(!total.condition);
        assert!(total.meal_record_ids.is_empty());
        assert_eq!(store.total_inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn racing_creates_share_one_row() {
        let store = Arc::new(MemStore::default());
        let user_id = Uuid::new_v4();
        let day = date!(2024 - 11 - 05);

        let (a, b) = tokio::join!(
            daily_total_for(store.as_ref(), user_id, day),
            daily_total_for(store.as_ref(), user_id, day),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(store.total_inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.totals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sums_keep_full_precision_until_formatting() {
        let mut catalog = MemCatalog::default();
        let lunch = add_meal_type(&mut catalog, "lunch");
        let a = add_food(&mut catalog, "rice", dec!(100.005));
        let b = add_food(&mut catalog, "stew", dec!(250.00));
        let user_id = Uuid::new_v4();

        let records = vec![record(user_id, a, lunch), record(user_id, b, lunch)];
        let day = aggregate_meals(&catalog, &records).await.unwrap();

        assert_eq!(day.kcal, dec!(350.005));
        assert_eq!(round_amount(day.kcal), dec!(350.01));
    }

    #[tokio::test]
    async fn unresolvable_records_are_skipped() {
        let mut catalog = MemCatalog::default();
        let dinner = add_meal_type(&mut catalog, "dinner");
        let a = add_food(&mut catalog, "soup", dec!(120));
        let b = add_food(&mut catalog, "bread", dec!(80));
        let user_id = Uuid::new_v4();

        let records = vec![
            record(user_id, a, dinner),
            record(user_id, Uuid::new_v4(), dinner), // food missing from catalog
            record(user_id, b, dinner),
        ];
        let day = aggregate_meals(&catalog, &records).await.unwrap();

        assert_eq!(day.meals.len(), 2);
        assert_eq!(day.kcal, dec!(200));
    }

    #[tokio::test]
    async fn missing_meal_type_also_skips() {
        let mut catalog = MemCatalog::default();
        let dinner = add_meal_type(&mut catalog, "dinner");
        let a = add_food(&mut catalog, "soup", dec!(120));
        let user_id = Uuid::new_v4();

        let records = vec![
            record(user_id, a, dinner),
            record(user_id, a, Uuid::new_v4()), // meal type missing
        ];
        let day = aggregate_meals(&catalog, &records).await.unwrap();

        assert_eq!(day.meals.len(), 1);
        assert_eq!(day.kcal, dec!(120));
    }

    #[tokio::test]
    async fn empty_and_fully_unresolvable_days_are_no_meals() {
        let catalog = MemCatalog::default();
        let user_id = Uuid::new_v4();

        let err = aggregate_meals(&catalog, &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::NoMealsFound));

        let records = vec![record(user_id, Uuid::new_v4(), Uuid::new_v4())];
        let err = aggregate_meals(&catalog, &records).await.unwrap_err();
        assert!(matches!(err, ApiError::NoMealsFound));
    }

    #[test]
    fn condition_is_strictly_greater_than() {
        let user_id = Uuid::new_v4();
        let rec = Recommendation {
            user_id,
            kcal: dec!(2000),
            carbs: dec!(300),
            protein: dec!(150),
            fat: dec!(60),
        };
        let mut total = DailyTotal::zero(user_id, date!(2024 - 11 - 05));

        total.kcal = dec!(2000);
        assert!(!exceeds_recommendation(&total, &rec));

        total.kcal = dec!(2000.01);
        assert!(exceeds_recommendation(&total, &rec));
    }

    #[test]
    fn rounding_is_half_up_at_two_decimals() {
        assert_eq!(round_amount(dec!(2.345)), dec!(2.35));
        assert_eq!(round_amount(dec!(2.344)), dec!(2.34));
        assert_eq!(round_amount(dec!(350.005)), dec!(350.01));
    }

    #[tokio::test]
    async fn status_flow_reuses_caches() {
        let store = MemStore::default();
        let engine = FixedEngine::new(dec!(2000));
        let p = profile();
        let day = date!(2024 - 11 - 05);

        let (total, rec, condition) =
            nutrition_status(&store, &store, &engine, &p, day).await.unwrap();
        assert_eq!(total.kcal, Decimal::ZERO);
        assert_eq!(rec.kcal, dec!(2000));
        assert!(!condition);

        nutrition_status(&store, &store, &engine, &p, day).await.unwrap();
        assert_eq!(engine.computes.load(Ordering::SeqCst), 1);
        assert_eq!(store.total_inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn meal_history_orders_persists_and_retains_ids() {
        let mut catalog = MemCatalog::default();
        let lunch = add_meal_type(&mut catalog, "lunch");
        let a = add_food(&mut catalog, "rice", dec!(100));
        let b = add_food(&mut catalog, "stew", dec!(250));
        let engine = FixedEngine::new(dec!(300));
        let store = MemStore::default();
        let p = profile();
        let day = date!(2024 - 11 - 05);

        let first = record(p.id, a, lunch);
        let ghost = record(p.id, Uuid::new_v4(), lunch); // never resolves
        let last = record(p.id, b, lunch);
        let ids = vec![first.id, ghost.id, last.id];
        for r in [&first, &ghost, &last] {
            store.records.lock().unwrap().insert(r.id, r.clone());
        }

        let mut row = DailyTotal::zero(p.id, day);
        row.meal_record_ids = ids.clone();
        store.totals.lock().unwrap().insert((p.id, day), row);

        let meals = meal_history(&store, &store, &store, &catalog, &engine, &p, day)
            .await
            .unwrap();

        // stored id order, not fetch order
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].food_name, "rice");
        assert_eq!(meals[1].food_name, "stew");

        let stored = store
            .totals
            .lock()
            .unwrap()
            .get(&(p.id, day))
            .cloned()
            .unwrap();
        assert_eq!(stored.kcal, dec!(350));
        assert!(stored.condition); // 350 > 300
        assert_eq!(stored.meal_record_ids, ids); // ghost retained for retry
    }

    #[tokio::test]
    async fn meal_history_without_day_row_is_not_found() {
        let store = MemStore::default();
        let catalog = MemCatalog::default();
        let engine = FixedEngine::new(dec!(2000));
        let p = profile();

        let err = meal_history(
            &store,
            &store,
            &store,
            &catalog,
            &engine,
            &p,
            date!(2024 - 11 - 05),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::DayNotFound));
    }
}
