//! Fixtures, mocks and helpers shared by every suite

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use storefront::StorefrontConfig;
use storefront::actions::{
    ActionRequest, OrderProtocolClient, ProgressCallback, ProgressItem, ProgressStep,
    ProtocolError, RefreshHook, Signer,
};
use storefront::config::ActionsConfig;
use storefront::error::StorefrontResult;
use storefront::fetcher::PageSource;
use storefront::tenant::{Organization, RuntimeMode, StaticTenantTable, TenantResolver};
use storefront::token::{RawTokenEntry, Token};

/// Ensure tracing is initialized only once across all tests
static INIT: Once = Once::new();

/// Initialize test environment
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "storefront=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}

pub const HOST_A: &str = "apes.shop.xyz";
pub const HOST_B: &str = "punks.shop.xyz";
pub const COLLECTION_A: &str = "0xaaa0000000000000000000000000000000000001";
pub const COLLECTION_A2: &str = "0xaaa0000000000000000000000000000000000002";
pub const COLLECTION_B: &str = "0xbbb0000000000000000000000000000000000001";
pub const DEV_COLLECTION_A: &str = "0xdddd000000000000000000000000000000000001";

/// Tenant A: no royalty recipient, royalties are computed downstream
pub fn tenant_a() -> Organization {
    serde_json::from_value(json!({
        "name": "Ape Market",
        "contractId": COLLECTION_A,
        "listingIcon": "/ape.svg",
        "collections": [
            { "name": "Apes", "contractId": COLLECTION_A, "listingIcon": "/ape.svg" },
            {
                "name": "Ape Kids",
                "contractId": COLLECTION_A2,
                "listingIcon": "/kid.svg",
                "royaltyFee": 0.075
            }
        ],
        "url": "https://apes.shop.xyz",
        "homeUrl": "https://apes.shop.xyz",
        "royaltyFee": 0.05,
        "serviceFee": 0.01,
        "serviceFeeRecipient": "0xDEF",
        "savingsRate": 0.0,
        "development": {
            "collections": [
                { "name": "Apes (testnet)", "contractId": DEV_COLLECTION_A, "listingIcon": "/ape.svg" }
            ],
            "serviceFee": 0.02,
            "testnetNetwork": true
        },
        "primaryColor": "#ff0000"
    }))
    .unwrap()
}

/// Tenant B: explicit royalty recipient, aggregation disabled
pub fn tenant_b() -> Organization {
    serde_json::from_value(json!({
        "name": "Punk Shop",
        "contractId": COLLECTION_B,
        "listingIcon": "/punk.svg",
        "collections": [
            { "name": "Punks", "contractId": COLLECTION_B, "listingIcon": "/punk.svg" }
        ],
        "disableAggregation": true,
        "url": "https://punks.shop.xyz",
        "homeUrl": "https://punks.shop.xyz",
        "royaltyFee": 0.05,
        "royaltyFeeRecipient": "0xABC",
        "serviceFee": 0.01,
        "serviceFeeRecipient": "0xDEF",
        "savingsRate": 0.0,
        "currencies": [
            { "symbol": "APE", "serviceFee": 0.0, "serviceFeeRecipient": "0xAPE" }
        ]
    }))
    .unwrap()
}

pub fn tenant_table() -> StaticTenantTable {
    StaticTenantTable::from_organizations([(HOST_A, tenant_a()), (HOST_B, tenant_b())])
}

pub fn resolver(mode: RuntimeMode) -> TenantResolver {
    TenantResolver::new(Arc::new(tenant_table()), mode, ".localhost:3000")
}

/// Configuration pointing both networks at `read_api_base`
pub fn test_config(read_api_base: &str) -> StorefrontConfig {
    let mut config = StorefrontConfig::default();
    config.read_api.mainnet_base_url = read_api_base.to_string();
    config.read_api.testnet_base_url = read_api_base.to_string();
    config.read_api.timeout_seconds = 5;
    config.price_feed.base_url = read_api_base.to_string();
    config.price_feed.api_key = Some("feed-key".to_string());
    config.actions = ActionsConfig::immediate();
    config
}

/// Aggregate token entry as returned by `/tokens/v5`
pub fn raw_token(collection: &str, token_id: &str, price_wei: Option<&str>, source: &str) -> Value {
    let market = price_wei.map_or(Value::Null, |raw| {
        json!({
            "floorAsk": {
                "id": format!("ask-{token_id}"),
                "price": {
                    "currency": { "contract": "0x0000000000000000000000000000000000000000", "decimals": 18, "symbol": "ETH" },
                    "amount": { "raw": raw }
                },
                "source": { "domain": source }
            }
        })
    });
    json!({
        "token": {
            "tokenId": token_id,
            "name": format!("Token {token_id}"),
            "collection": { "id": collection }
        },
        "market": market
    })
}

/// A converted aggregate token
pub fn listed_token(collection: &str, token_id: &str, price_wei: Option<&str>) -> Token {
    let entry: RawTokenEntry =
        serde_json::from_value(raw_token(collection, token_id, price_wei, "apes.shop.xyz")).unwrap();
    Token::from_aggregate(entry, Some("apes.shop.xyz"))
}

/// Page source answering from a closure, optionally held behind a gate
pub struct MockPageSource {
    responder: Box<dyn Fn(&Url) -> StorefrontResult<Value> + Send + Sync>,
    gate: Option<Arc<Semaphore>>,
    requests: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockPageSource {
    pub fn new(responder: impl Fn(&Url) -> StorefrontResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            gate: None,
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch waits for a permit on `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    async fn fetch_json(&self, url: &Url) -> StorefrontResult<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        (self.responder)(url)
    }
}

pub struct TestSigner(pub String);

impl Signer for TestSigner {
    fn address(&self) -> &str {
        &self.0
    }
}

/// How the scripted protocol client settles
#[derive(Debug, Clone)]
pub enum Script {
    /// Report created, then submitted progress, then resolve
    Succeed,
    /// Resolve without ever reporting the submitted step
    SucceedSilently,
    /// Report created progress, then fail
    FailAfterCreated(ProtocolError),
    /// Report the submitted step, then fail
    FailAfterSubmitted(ProtocolError),
    /// Fail before any progress
    FailImmediately(ProtocolError),
}

/// Order-protocol client that follows a script
pub struct ScriptedClient {
    script: Script,
    pub submissions: Mutex<Vec<ActionRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            submissions: Mutex::new(Vec::new()),
        }
    }
}

fn step(status: &str) -> ProgressStep {
    ProgressStep {
        id: Some("sale".to_string()),
        action: None,
        items: vec![ProgressItem {
            status: Some(status.to_string()),
            tx_hash: None,
        }],
    }
}

#[async_trait]
impl OrderProtocolClient for ScriptedClient {
    async fn submit(
        &self,
        request: &ActionRequest,
        _signer: &dyn Signer,
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), ProtocolError> {
        self.submissions.lock().push(request.clone());
        match &self.script {
            Script::Succeed => {
                on_progress(&[step("incomplete")]);
                tokio::task::yield_now().await;
                on_progress(&[step("complete"), step("complete")]);
                Ok(())
            }
            Script::SucceedSilently => Ok(()),
            Script::FailAfterCreated(error) => {
                on_progress(&[step("incomplete")]);
                Err(error.clone())
            }
            Script::FailAfterSubmitted(error) => {
                on_progress(&[step("complete")]);
                tokio::task::yield_now().await;
                Err(error.clone())
            }
            Script::FailImmediately(error) => Err(error.clone()),
        }
    }
}

/// Refresh hook recording each call
#[derive(Default)]
pub struct RecordingRefresh {
    pub calls: AtomicUsize,
}

impl RecordingRefresh {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RefreshHook for RecordingRefresh {
    fn refresh(&self, _request: &ActionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
