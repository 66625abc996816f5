//! Storefront HTTP server

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::StorefrontConfig,
    error::StorefrontResult,
    handlers::{health, social, stats, storefront},
    middleware::{create_cors_layer, logging_middleware},
    price_feed::PriceFeedClient,
    read_api::ReadApiClient,
    social::{InMemoryActivityStore, PostgresActivityStore, SocialActivityStore},
    tenant::{Chain, Organization, StaticTenantTable, TenantResolver, TenantSource},
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StorefrontConfig>,
    pub resolver: TenantResolver,
    pub mainnet: Arc<ReadApiClient>,
    pub testnet: Arc<ReadApiClient>,
    pub social: Arc<dyn SocialActivityStore>,
    pub price_feed: Arc<PriceFeedClient>,
    pub tenant_count: usize,
    pub start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resolver", &self.resolver)
            .field("mainnet", &self.mainnet.base().as_str())
            .field("testnet", &self.testnet.base().as_str())
            .field("social", &"Arc<dyn SocialActivityStore>")
            .field("tenant_count", &self.tenant_count)
            .finish()
    }
}

impl AppState {
    /// Wire the state from its collaborators
    pub fn new(
        config: StorefrontConfig,
        tenants: Arc<dyn TenantSource>,
        tenant_count: usize,
        social: Arc<dyn SocialActivityStore>,
    ) -> StorefrontResult<Self> {
        let mainnet = ReadApiClient::new(&config.read_api.mainnet_base_url, &config.read_api)?;
        let testnet = ReadApiClient::new(&config.read_api.testnet_base_url, &config.read_api)?;
        let price_feed = PriceFeedClient::new(&config.price_feed)?;
        let resolver = TenantResolver::new(
            tenants,
            config.mode,
            config.tenants.local_host_suffix.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            resolver,
            mainnet: Arc::new(mainnet),
            testnet: Arc::new(testnet),
            social,
            price_feed: Arc::new(price_feed),
            tenant_count,
            start_time: Instant::now(),
        })
    }

    /// Read API client for the organization's network
    #[must_use]
    pub fn read_api(&self, organization: &Organization) -> Arc<ReadApiClient> {
        match organization.chain() {
            Chain::Mainnet => Arc::clone(&self.mainnet),
            Chain::Testnet => Arc::clone(&self.testnet),
        }
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/organization", get(storefront::organization))
        .route("/api/collections/:collection_id", get(storefront::collection_page))
        .route(
            "/api/collections/:collection_id/refresh",
            post(storefront::refresh_collection),
        )
        .route(
            "/api/collections/:collection_id/tokens/:token_id",
            get(storefront::token_page),
        )
        .route("/api/wallets/:address/tokens", get(storefront::wallet_tokens))
        .route(
            "/api/wallet_token_activities",
            get(social::get_activity).post(social::post_activity),
        )
        .route("/api/activities", get(social::list_activities))
        .route("/api/stats", get(stats::eth_price))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(
            config.server.timeout_seconds,
        )))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http());

    if config.cors.enabled {
        app = app.layer(create_cors_layer(&config.cors));
    }
    app
}

/// Storefront server
pub struct StorefrontServer {
    config: StorefrontConfig,
}

impl StorefrontServer {
    #[must_use]
    pub const fn new(config: StorefrontConfig) -> Self {
        Self { config }
    }

    async fn connect_social_store(&self) -> Result<Arc<dyn SocialActivityStore>> {
        match &self.config.social.database_url {
            Some(url) => {
                let store =
                    PostgresActivityStore::connect(url, self.config.social.max_connections).await?;
                Ok(Arc::new(store))
            }
            None => {
                warn!("No social database configured; activity is kept in memory");
                Ok(Arc::new(InMemoryActivityStore::new()))
            }
        }
    }

    /// Load tenants, connect stores and serve until shutdown
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = match self.config.server_address().parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!(
                    "Invalid server address '{}': {}",
                    self.config.server_address(),
                    e
                );
                return Err(anyhow::anyhow!("Invalid server address: {}", e));
            }
        };

        let table = StaticTenantTable::from_file(&self.config.tenants.path)?;
        let tenant_count = table.len();
        let social = self.connect_social_store().await?;
        let state = AppState::new(self.config, Arc::new(table), tenant_count, social)?;
        let app = create_router(state);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("Storefront listening on {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind TCP listener to {}: {}", addr, e);
                return Err(anyhow::anyhow!("Failed to bind to address {}: {}", addr, e));
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            error!("Server encountered a fatal error: {}", e);
            return Err(anyhow::anyhow!("Server error: {}", e));
        }

        Ok(())
    }
}

/// API route documentation
pub fn print_routes() {
    println!("Storefront Routes:");
    println!("==================");
    println!();
    println!("Health:");
    println!("  GET  /health                                          - Health check");
    println!();
    println!("Tenant pages (resolved from Host):");
    println!("  GET  /api/organization?collectionId=                  - Resolved organization");
    println!("  GET  /api/collections/:collection_id                  - Collection first page");
    println!("  POST /api/collections/:collection_id/refresh          - Request metadata refresh");
    println!("  GET  /api/collections/:collection_id/tokens/:token_id - Token detail");
    println!("  GET  /api/wallets/:address/tokens                     - Wallet tokens first page");
    println!();
    println!("Social:");
    println!("  GET  /api/wallet_token_activities                     - Views and likes");
    println!("  POST /api/wallet_token_activities                     - Record view or like");
    println!("  GET  /api/activities?collectionId=&tokenId=           - Token activity log");
    println!();
    println!("Market:");
    println!("  GET  /api/stats                                       - ETH price");
}
