//! `/api/stats`

use axum::{extract::State, response::Json};

use crate::error::StorefrontError;
use crate::price_feed::EthPrice;
use crate::server::AppState;

/// Current ETH price, proxied so the feed key stays server-side
pub async fn eth_price(State(state): State<AppState>) -> Result<Json<EthPrice>, StorefrontError> {
    let price = state.price_feed.eth_price().await?;
    Ok(Json(price))
}
