//! `/api/wallet_token_activities` and `/api/activities`

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::StorefrontError;
use crate::models::{ActivitiesQuery, ActivityQuery, ActivityRequest};
use crate::server::AppState;
use crate::social::{Activity, ActivityFilter, ActivityKey, ActivitySummary, ActivityUpdate};

/// Views and likes for a token, plus the asking wallet's like
pub async fn get_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivitySummary>, StorefrontError> {
    let key = ActivityKey::new(&query.collection_id, &query.token_id, &query.wallet_address)?;
    let summary = state.social.summary(&key).await?;
    Ok(Json(summary))
}

/// Record a view and/or set a like; answers `{}`
pub async fn post_activity(
    State(state): State<AppState>,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<Value>, StorefrontError> {
    let key = ActivityKey::new(
        &request.collection_id,
        &request.token_id,
        &request.wallet_address,
    )?;
    let update = ActivityUpdate {
        like: request.like,
        view: request.view.unwrap_or(false),
    };
    state.social.apply(&key, update).await?;
    info!(
        collection_id = %key.collection_id,
        token_id = %key.token_id,
        like = ?update.like,
        view = update.view,
        "Recorded wallet token activity"
    );
    Ok(Json(json!({})))
}

/// Activity log for a collection and/or token
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<Vec<Activity>>, StorefrontError> {
    let filter = ActivityFilter::new(query.collection_id.as_deref(), query.token_id.as_deref());
    let activities = state.social.activities(&filter).await?;
    debug!(
        collection_id = ?filter.collection_id,
        token_id = ?filter.token_id,
        count = activities.len(),
        "Listed activities"
    );
    Ok(Json(activities))
}
