//! `PostgreSQL` social activity store

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{
    Activity, ActivityFilter, ActivityKey, ActivitySummary, ActivityUpdate, SocialActivityStore,
};
use crate::error::StorefrontResult;

/// Store backed by the `wallet_token_activities` table
#[derive(Debug, Clone)]
pub struct PostgresActivityStore {
    /// Database pool
    db_pool: PgPool,
}

impl PostgresActivityStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Connect and make sure the table exists
    pub async fn connect(database_url: &str, max_connections: u32) -> StorefrontResult<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(db_pool);
        store.ensure_schema().await?;
        info!("Connected social activity store");
        Ok(store)
    }

    /// Create the counters and activity tables if missing
    pub async fn ensure_schema(&self) -> StorefrontResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS wallet_token_activities (
                collection_id TEXT NOT NULL,
                token_id TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                liked BOOLEAN NOT NULL DEFAULT FALSE,
                views BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (collection_id, token_id, wallet_address)
            )
            ",
        )
        .execute(&self.db_pool)
        .await?;
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS activities (
                id BIGSERIAL PRIMARY KEY,
                collection_id TEXT NOT NULL,
                token_id TEXT NOT NULL,
                activity_type TEXT NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                amount_text TEXT NOT NULL,
                currency TEXT NOT NULL,
                transaction_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SocialActivityStore for PostgresActivityStore {
    async fn apply(&self, key: &ActivityKey, update: ActivityUpdate) -> StorefrontResult<()> {
        sqlx::query(
            r"
            INSERT INTO wallet_token_activities (
                collection_id, token_id, wallet_address, liked, views
            ) VALUES (
                $1, $2, $3, COALESCE($4, FALSE), $5
            )
            ON CONFLICT (collection_id, token_id, wallet_address) DO UPDATE SET
                liked = COALESCE($4, wallet_token_activities.liked),
                views = wallet_token_activities.views + $5
            ",
        )
        .bind(&key.collection_id)
        .bind(&key.token_id)
        .bind(&key.wallet_address)
        .bind(update.like)
        .bind(i64::from(update.view))
        .execute(&self.db_pool)
        .await?;

        debug!(
            collection_id = %key.collection_id,
            token_id = %key.token_id,
            "Wallet token activity persisted"
        );
        Ok(())
    }

    async fn summary(&self, key: &ActivityKey) -> StorefrontResult<ActivitySummary> {
        let row = sqlx::query(
            r"
            SELECT
                COALESCE(SUM(views), 0)::BIGINT AS total_views,
                COUNT(*) FILTER (WHERE liked) AS total_likes,
                COALESCE(BOOL_OR(liked) FILTER (WHERE wallet_address = $3), FALSE) AS wallet_like
            FROM wallet_token_activities
            WHERE collection_id = $1 AND token_id = $2
            ",
        )
        .bind(&key.collection_id)
        .bind(&key.token_id)
        .bind(&key.wallet_address)
        .fetch_one(&self.db_pool)
        .await?;

        let total_views: i64 = row.try_get("total_views")?;
        let total_likes: i64 = row.try_get("total_likes")?;
        Ok(ActivitySummary {
            total_views: u64::try_from(total_views).unwrap_or_default(),
            total_likes: u64::try_from(total_likes).unwrap_or_default(),
            wallet_like: row.try_get("wallet_like")?,
        })
    }

    async fn record_activity(&self, activity: Activity) -> StorefrontResult<()> {
        let activity = activity.normalized();
        sqlx::query(
            r"
            INSERT INTO activities (
                collection_id, token_id, activity_type, from_address, to_address,
                amount_text, currency, transaction_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&activity.collection_id)
        .bind(&activity.token_id)
        .bind(&activity.kind)
        .bind(&activity.from_address)
        .bind(&activity.to_address)
        .bind(&activity.amount_text)
        .bind(&activity.currency)
        .bind(&activity.transaction_id)
        .bind(activity.created_at)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn activities(&self, filter: &ActivityFilter) -> StorefrontResult<Vec<Activity>> {
        let rows = sqlx::query(
            r"
            SELECT
                collection_id, token_id, activity_type, from_address, to_address,
                amount_text, currency, transaction_id, created_at
            FROM activities
            WHERE ($1::TEXT IS NULL OR collection_id = $1)
              AND ($2::TEXT IS NULL OR token_id = $2)
            ORDER BY created_at, id
            ",
        )
        .bind(filter.collection_id.as_deref())
        .bind(filter.token_id.as_deref())
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter()
            .map(|row| -> StorefrontResult<Activity> {
                Ok(Activity {
                    collection_id: row.try_get("collection_id")?,
                    token_id: row.try_get("token_id")?,
                    kind: row.try_get("activity_type")?,
                    from_address: row.try_get("from_address")?,
                    to_address: row.try_get("to_address")?,
                    amount_text: row.try_get("amount_text")?,
                    currency: row.try_get("currency")?,
                    transaction_id: row.try_get("transaction_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
