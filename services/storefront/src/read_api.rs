//! HTTP client for the upstream read API
//!
//! Paginated endpoints go through [`PageSource`]; single-shot reads (stats,
//! source stats, asks) and the collection refresh request live here too.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ReadApiConfig;
use crate::error::{StorefrontError, StorefrontResult};
use crate::fetcher::{PageSource, decode_body as decode, endpoint_url};
use crate::token::Ask;

/// Aggregate stats for a collection (`/stats/v2`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub on_sale_count: u64,
}

#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    stats: CollectionStats,
}

/// Per-marketplace stats for a collection (`/collections/sources/v1`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    #[serde(default)]
    pub source_domain: Option<String>,
    #[serde(default)]
    pub on_sale_count: u64,
    #[serde(default)]
    pub floor_ask_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SourcesEnvelope {
    #[serde(default)]
    sources: Vec<SourceStats>,
}

#[derive(Debug, Deserialize)]
struct AsksEnvelope {
    #[serde(default)]
    orders: Vec<Ask>,
}

/// Read API client bound to one base URL
#[derive(Debug, Clone)]
pub struct ReadApiClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
    api_key_header: String,
    asks_limit: u32,
}

impl ReadApiClient {
    /// Create a client for `base_url`
    pub fn new(base_url: &str, config: &ReadApiConfig) -> StorefrontResult<Self> {
        let base = Url::parse(base_url).map_err(|e| StorefrontError::Configuration {
            message: format!("invalid read API base '{base_url}': {e}"),
        })?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base,
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            asks_limit: config.asks_limit,
        })
    }

    /// Base URL requests are built from
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(self.api_key_header.as_str(), key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StorefrontResult<Value> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Read API request failed");
            return Err(StorefrontError::ReadApi {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Collection-wide token and on-sale counts
    pub async fn collection_stats(&self, collection_id: &str) -> StorefrontResult<CollectionStats> {
        let mut url = endpoint_url(&self.base, "/stats/v2");
        url.query_pairs_mut().append_pair("collection", collection_id);
        let body = self.fetch_json(&url).await?;
        let envelope: StatsEnvelope = decode("stats", body)?;
        Ok(envelope.stats)
    }

    /// Stats for the listing held on `source_domain`, if any
    pub async fn source_stats(
        &self,
        collection_id: &str,
        source_domain: &str,
    ) -> StorefrontResult<Option<SourceStats>> {
        let mut url = endpoint_url(&self.base, "/collections/sources/v1");
        url.query_pairs_mut().append_pair("collection", collection_id);
        let body = self.fetch_json(&url).await?;
        let envelope: SourcesEnvelope = decode("collection sources", body)?;
        Ok(envelope.sources.into_iter().find(|s| {
            s.source_domain
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(source_domain))
        }))
    }

    /// Open asks for a token and/or maker
    pub async fn asks(&self, token: Option<&str>, maker: Option<&str>) -> StorefrontResult<Vec<Ask>> {
        if token.is_none() && maker.is_none() {
            return Ok(Vec::new());
        }
        let mut url = endpoint_url(&self.base, "/orders/asks/v3");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &self.asks_limit.to_string());
            if let Some(token) = token {
                pairs.append_pair("token", token);
            }
            if let Some(maker) = maker {
                pairs.append_pair("maker", maker);
            }
        }
        let body = self.fetch_json(&url).await?;
        let envelope: AsksEnvelope = decode("asks", body)?;
        Ok(envelope.orders)
    }

    /// Ask the indexer to re-sync a collection's metadata
    pub async fn refresh_collection(&self, collection_id: &str) -> StorefrontResult<()> {
        let url = endpoint_url(&self.base, "/collections/refresh/v1");
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "collection": collection_id }));
        self.send(request).await?;
        info!(collection_id = %collection_id, "Requested collection refresh");
        Ok(())
    }
}

#[async_trait]
impl PageSource for ReadApiClient {
    async fn fetch_json(&self, url: &Url) -> StorefrontResult<Value> {
        debug!(url = %url, "Fetching from read API");
        self.send(self.client.get(url.clone())).await
    }
}
