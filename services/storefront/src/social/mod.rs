//! Per-token social activity: views and likes per wallet
//!
//! Rows are keyed by `(collection, token, wallet)`, all lower-cased. Views are
//! a monotonically increasing counter; a like is a flag that is overwritten,
//! so repeating the same like or unlike changes nothing.
//!
//! The store also keeps the marketplace activity log listed per collection or
//! token.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StorefrontError, StorefrontResult};

pub use postgres::PostgresActivityStore;

/// Row key, normalized to lower case
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityKey {
    pub collection_id: String,
    pub token_id: String,
    pub wallet_address: String,
}

impl ActivityKey {
    /// Build a key; every part is required
    pub fn new(collection_id: &str, token_id: &str, wallet_address: &str) -> StorefrontResult<Self> {
        let normalize = |field: &str, value: &str| {
            let value = value.trim();
            if value.is_empty() {
                return Err(StorefrontError::Validation {
                    message: format!("{field} is required"),
                });
            }
            Ok(value.to_ascii_lowercase())
        };
        Ok(Self {
            collection_id: normalize("collectionId", collection_id)?,
            token_id: normalize("tokenId", token_id)?,
            wallet_address: normalize("walletAddress", wallet_address)?,
        })
    }

    fn same_token(&self, other: &Self) -> bool {
        self.collection_id == other.collection_id && self.token_id == other.token_id
    }
}

/// A write against one row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ActivityUpdate {
    /// New like flag; `None` leaves it unchanged
    pub like: Option<bool>,
    /// Count one more view
    pub view: bool,
}

/// Aggregates for a token, plus the asking wallet's like
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Views summed over all wallets
    pub total_views: u64,
    /// Wallets currently liking the token
    pub total_likes: u64,
    pub wallet_like: bool,
}

/// A marketplace event on a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub collection_id: String,
    pub token_id: String,
    /// Event type, e.g. `sale` or `list`
    #[serde(rename = "type")]
    pub kind: String,
    pub from_address: String,
    pub to_address: String,
    /// Amount as displayed, e.g. `1.5`
    pub amount_text: String,
    pub currency: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    fn normalized(mut self) -> Self {
        self.collection_id = self.collection_id.trim().to_ascii_lowercase();
        self.token_id = self.token_id.trim().to_ascii_lowercase();
        self
    }
}

/// Equality filters over the activity log; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub collection_id: Option<String>,
    pub token_id: Option<String>,
}

impl ActivityFilter {
    /// Build a filter; blank values are ignored
    #[must_use]
    pub fn new(collection_id: Option<&str>, token_id: Option<&str>) -> Self {
        let normalize = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_ascii_lowercase)
        };
        Self {
            collection_id: normalize(collection_id),
            token_id: normalize(token_id),
        }
    }

    #[must_use]
    pub fn matches(&self, activity: &Activity) -> bool {
        self.collection_id
            .as_ref()
            .is_none_or(|c| *c == activity.collection_id)
            && self.token_id.as_ref().is_none_or(|t| *t == activity.token_id)
    }
}

/// Persisted social counters and activity log
#[async_trait]
pub trait SocialActivityStore: Send + Sync {
    /// Upsert one row
    async fn apply(&self, key: &ActivityKey, update: ActivityUpdate) -> StorefrontResult<()>;

    /// Aggregates for the key's token and the key's wallet
    async fn summary(&self, key: &ActivityKey) -> StorefrontResult<ActivitySummary>;

    /// Append one event to the activity log
    async fn record_activity(&self, activity: Activity) -> StorefrontResult<()>;

    /// Events matching `filter`, oldest first
    async fn activities(&self, filter: &ActivityFilter) -> StorefrontResult<Vec<Activity>>;

    /// Count a view
    async fn record_view(&self, key: &ActivityKey) -> StorefrontResult<()> {
        self.apply(
            key,
            ActivityUpdate {
                like: None,
                view: true,
            },
        )
        .await
    }

    /// Set the wallet's like flag and return fresh aggregates
    async fn set_like(&self, key: &ActivityKey, liked: bool) -> StorefrontResult<ActivitySummary> {
        self.apply(
            key,
            ActivityUpdate {
                like: Some(liked),
                view: false,
            },
        )
        .await?;
        self.summary(key).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ActivityRow {
    views: u64,
    like: bool,
}

/// Store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    rows: DashMap<ActivityKey, ActivityRow>,
    log: RwLock<Vec<Activity>>,
}

impl InMemoryActivityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialActivityStore for InMemoryActivityStore {
    async fn apply(&self, key: &ActivityKey, update: ActivityUpdate) -> StorefrontResult<()> {
        let mut row = self.rows.entry(key.clone()).or_default();
        if let Some(like) = update.like {
            row.like = like;
        }
        if update.view {
            row.views = row.views.saturating_add(1);
        }
        debug!(
            collection_id = %key.collection_id,
            token_id = %key.token_id,
            views = row.views,
            like = row.like,
            "Updated wallet token activity"
        );
        Ok(())
    }

    async fn summary(&self, key: &ActivityKey) -> StorefrontResult<ActivitySummary> {
        let mut summary = ActivitySummary::default();
        for entry in self.rows.iter().filter(|entry| entry.key().same_token(key)) {
            summary.total_views += entry.views;
            if entry.like {
                summary.total_likes += 1;
            }
            if entry.key().wallet_address == key.wallet_address {
                summary.wallet_like = entry.like;
            }
        }
        Ok(summary)
    }

    async fn record_activity(&self, activity: Activity) -> StorefrontResult<()> {
        let activity = activity.normalized();
        debug!(
            collection_id = %activity.collection_id,
            token_id = %activity.token_id,
            kind = %activity.kind,
            "Recorded activity"
        );
        self.log.write().push(activity);
        Ok(())
    }

    async fn activities(&self, filter: &ActivityFilter) -> StorefrontResult<Vec<Activity>> {
        let mut matched: Vec<Activity> = self
            .log
            .read()
            .iter()
            .filter(|activity| filter.matches(activity))
            .cloned()
            .collect();
        matched.sort_by_key(|activity| activity.created_at);
        Ok(matched)
    }
}
