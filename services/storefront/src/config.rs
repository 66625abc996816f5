//! Configuration for the storefront service

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tenant::RuntimeMode;

/// Storefront configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Production or development layering
    #[serde(default)]
    pub mode: RuntimeMode,
    /// Tenant table location and host normalization
    pub tenants: TenantsConfig,
    /// Upstream read API
    pub read_api: ReadApiConfig,
    /// Marketplace action timing
    pub actions: ActionsConfig,
    /// Social activity persistence
    pub social: SocialConfig,
    /// ETH price feed proxied by `/api/stats`
    pub price_feed: PriceFeedConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

/// Tenant table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantsConfig {
    /// JSON file mapping hostnames to organization records
    pub path: String,
    /// Suffix stripped from `Host` before lookup
    pub local_host_suffix: String,
}

/// Read API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadApiConfig {
    /// Base URL for mainnet tenants
    pub mainnet_base_url: String,
    /// Base URL for testnet tenants
    pub testnet_base_url: String,
    /// API key, if the upstream requires one
    pub api_key: Option<String>,
    /// Header carrying the API key
    pub api_key_header: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Page size for token listings
    pub tokens_page_limit: u32,
    /// Page size for sales history
    pub sales_page_limit: u32,
    /// Page size for offers
    pub bids_page_limit: u32,
    /// Page size for collection listings
    pub collections_page_limit: u32,
    /// Maximum asks fetched in one lookup
    pub asks_limit: u32,
}

impl ReadApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Timing of the post-submission settlement phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Attempts made by the settlement poll before giving up
    pub settlement_poll_attempts: u32,
    /// First poll delay; doubles after every miss
    pub settlement_initial_backoff_ms: u64,
    /// Fixed wait between `Submitted` and `Completed` when no probe is wired
    pub submitted_to_completed_ms: u64,
    /// Wait between `Completed` and `Success`
    pub completed_to_success_ms: u64,
}

impl ActionsConfig {
    /// Zero delays, for tests
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            settlement_poll_attempts: 3,
            settlement_initial_backoff_ms: 0,
            submitted_to_completed_ms: 0,
            completed_to_success_ms: 0,
        }
    }
}

/// Social activity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Postgres URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Connection pool size
    pub max_connections: u32,
}

/// ETH price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Feed base URL; `/api` is appended
    pub base_url: String,
    /// Feed API key, sent as the `apikey` query parameter
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
}

impl PriceFeedConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight requests
    pub max_age_seconds: u64,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                timeout_seconds: 30,
                max_body_size: 64 * 1024,
            },
            mode: RuntimeMode::Production,
            tenants: TenantsConfig {
                path: "tenants.json".to_string(),
                local_host_suffix: ".localhost:3000".to_string(),
            },
            read_api: ReadApiConfig {
                mainnet_base_url: "https://api.reservoir.tools".to_string(),
                testnet_base_url: "https://api-goerli.reservoir.tools".to_string(),
                api_key: None,
                api_key_header: "x-api-key".to_string(),
                timeout_seconds: 10,
                tokens_page_limit: 20,
                sales_page_limit: 10,
                bids_page_limit: 10,
                collections_page_limit: 20,
                asks_limit: 1000,
            },
            actions: ActionsConfig {
                settlement_poll_attempts: 6,
                settlement_initial_backoff_ms: 500,
                submitted_to_completed_ms: 3000,
                completed_to_success_ms: 500,
            },
            social: SocialConfig {
                database_url: None,
                max_connections: 5,
            },
            price_feed: PriceFeedConfig {
                base_url: "https://api.etherscan.io".to_string(),
                api_key: None,
                timeout_seconds: 10,
            },
            cors: CorsConfig {
                enabled: true,
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec![
                    "GET".to_string(),
                    "POST".to_string(),
                    "OPTIONS".to_string(),
                ],
                allowed_headers: vec!["Content-Type".to_string()],
                max_age_seconds: 86400, // 24 hours
            },
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from file, then `STOREFRONT__`-prefixed environment
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("STOREFRONT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get server address
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
