//! ETH price feed behind `/api/stats`
//!
//! The feed wraps its payload in `{ status, message, result }`; a status other
//! than `"1"` carries the failure reason in `result`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::PriceFeedConfig;
use crate::error::{StorefrontError, StorefrontResult};
use crate::fetcher::{decode_body, endpoint_url};

/// Latest ETH quote, as reported by the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthPrice {
    pub ethbtc: String,
    pub ethbtc_timestamp: String,
    pub ethusd: String,
    pub ethusd_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// Price feed client; the API key never leaves the server
#[derive(Debug, Clone)]
pub struct PriceFeedClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl PriceFeedClient {
    pub fn new(config: &PriceFeedConfig) -> StorefrontResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| StorefrontError::Configuration {
            message: format!("invalid price feed base '{}': {e}", config.base_url),
        })?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base,
            api_key: config.api_key.clone(),
        })
    }

    /// Current ETH/BTC and ETH/USD quote
    pub async fn eth_price(&self) -> StorefrontResult<EthPrice> {
        let mut url = endpoint_url(&self.base, "/api");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("module", "stats");
            pairs.append_pair("action", "ethprice");
            if let Some(key) = &self.api_key {
                pairs.append_pair("apikey", key);
            }
        }
        debug!(base = %self.base, "Fetching ETH price");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Price feed request failed");
            return Err(StorefrontError::PriceFeed {
                message: format!("feed returned {status}: {body}"),
            });
        }

        let envelope: FeedEnvelope = response.json().await?;
        if envelope.status != "1" {
            let message = envelope
                .result
                .as_str()
                .map_or(envelope.message, str::to_string);
            warn!(reason = %message, "Price feed reported an error");
            return Err(StorefrontError::PriceFeed { message });
        }
        decode_body("eth price", envelope.result)
    }
}
