use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool};

use super::UserStore;
use crate::models::{
    transactions::{DepositRecord, WithdrawalRecord},
    users::User,
};

/// Users stored as JSONB documents, one row per user. Email and referral
/// code are mirrored into columns for lookups.
#[derive(Clone)]
pub struct PostgresUserStore {
    conn: PgPool,
}

impl PostgresUserStore {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::migrate!("./migrations").run(&self.conn).await?;

        Ok(())
    }

    async fn find_by_column(&self, query: &str, value: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_scalar::<_, Json<User>>(query)
            .bind(value)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user.map(|Json(user)| user))
    }

    // Single statement, so concurrent appends to the same document are not lost.
    async fn push_to_array(&self, id: &str, field: &str, value: Value) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET document = jsonb_set(
                    document,
                    ARRAY[$2::text],
                    COALESCE(document -> $2::text, '[]'::jsonb) || jsonb_build_array($3::jsonb)
                ),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(field)
        .bind(Json(value))
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn insert(&self, user: &User) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, referral_code, document)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.referral_code)
        .bind(Json(user))
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_by_column("SELECT document FROM users WHERE id = $1", id)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_by_column("SELECT document FROM users WHERE email = $1", email)
            .await
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_by_column(
            "SELECT document FROM users WHERE referral_code = $1 ORDER BY created_at LIMIT 1",
            code,
        )
        .await
    }

    async fn list(&self) -> Result<Vec<User>, anyhow::Error> {
        let users = sqlx::query_scalar::<_, Json<User>>(
            "SELECT document FROM users ORDER BY created_at",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(users.into_iter().map(|Json(user)| user).collect())
    }

    async fn delete_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_scalar::<_, Json<User>>(
            "DELETE FROM users WHERE email = $1 RETURNING document",
        )
        .bind(email)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user.map(|Json(user)| user))
    }

    async fn save(&self, user: &User) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, referral_code = $3, document = $4, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.referral_code)
        .bind(Json(user))
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_fields(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_scalar::<_, Json<User>>(
            r#"
            UPDATE users
            SET document = document || $2::jsonb,
                email = COALESCE($2::jsonb ->> 'email', email),
                referral_code = COALESCE($2::jsonb ->> 'referralCode', referral_code),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING document
            "#,
        )
        .bind(id)
        .bind(Json(fields))
        .fetch_optional(&self.conn)
        .await?;

        Ok(user.map(|Json(user)| user))
    }

    async fn push_deposit(&self, id: &str, record: &DepositRecord) -> Result<bool, anyhow::Error> {
        self.push_to_array(id, "history", serde_json::to_value(record)?)
            .await
    }

    async fn push_withdrawal(
        &self,
        id: &str,
        record: &WithdrawalRecord,
    ) -> Result<bool, anyhow::Error> {
        self.push_to_array(id, "withdrawals", serde_json::to_value(record)?)
            .await
    }

    async fn push_referred_user(
        &self,
        referrer_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error> {
        self.push_to_array(referrer_id, "referredUsers", Value::String(user_id.to_string()))
            .await
    }
}
