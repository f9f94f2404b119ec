use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub const GENDER_MALE: i16 = 0;
pub const GENDER_FEMALE: i16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub birthday: Date,
    pub age: i32,
    pub gender: i16,
    pub height: Decimal,
    pub weight: Decimal,
    pub created_at: OffsetDateTime,
}

impl UserProfile {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, nickname, birthday, age, gender, height, weight, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
