//! Multi-tenant NFT storefront
//!
//! One deployment serves many branded storefronts. Each request's host selects
//! a tenant (organization) whose collections, fees and theme drive the view.
//! Features:
//! - Layered tenant resolution with collection tenancy isolation
//! - URL-persisted filter state (attributes, price range, buy-now, sort)
//! - Cursor-paginated catalog fetching over a shared page cache
//! - Client-side price filtering in exact base units
//! - Marketplace action lifecycle (list, buy, offer, cancel, accept)
//! - Per-token view and like counters, plus the token activity log
//! - ETH price proxy

#![allow(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Result;

pub mod actions;
pub mod amount;
pub mod config;
pub mod currency;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod price_feed;
pub mod query;
pub mod read_api;
pub mod server;
pub mod social;
pub mod tenant;
pub mod token;

pub use config::StorefrontConfig;
pub use error::{StorefrontError, StorefrontResult};
pub use server::{AppState, StorefrontServer, create_router};
pub use tenant::{Organization, RuntimeMode, StaticTenantTable, TenantResolver, TenantSource};

/// Start the storefront server
pub async fn start_server(config: StorefrontConfig) -> Result<()> {
    StorefrontServer::new(config).start().await
}
