//! Key loaders for each paginated read API endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::{KeyLoader, Page, decode_body, endpoint_url};
use crate::error::StorefrontResult;
use crate::query::FilterState;
use crate::token::{Bid, RawTokensResponse, RawUserTokensResponse, Sale, Token};

fn continuation_for<T>(index: usize, previous: Option<&Page<T>>) -> Option<Option<String>> {
    match (index, previous) {
        (0, _) => Some(None),
        (_, Some(page)) if !page.is_terminal() => Some(page.continuation.clone()),
        _ => None,
    }
}

/// Collection tokens (`/tokens/v5`)
#[derive(Debug, Clone)]
pub struct TokensKey {
    base: Url,
    collection_id: String,
    tokens: Option<Vec<String>>,
    /// Restrict to orders on this domain (buy-now mode)
    source: Option<String>,
    /// Tenant domain used to mark local listings
    own_domain: Option<String>,
    include_attributes: bool,
    sort: Option<String>,
    attributes: Vec<(String, String)>,
    limit: u32,
}

impl TokensKey {
    pub fn new(base: Url, collection_id: impl Into<String>, limit: u32) -> Self {
        Self {
            base,
            collection_id: collection_id.into(),
            tokens: None,
            source: None,
            own_domain: None,
            include_attributes: false,
            sort: None,
            attributes: Vec::new(),
            limit,
        }
    }

    /// Apply URL filter state: sort, attribute selections, buy-now source
    #[must_use]
    pub fn with_filters(mut self, filters: &FilterState, own_domain: &str) -> Self {
        self.sort.clone_from(&filters.sort);
        self.attributes = filters
            .attribute_selections
            .iter()
            .flat_map(|(name, values)| {
                values
                    .iter()
                    .map(move |value| (format!("attributes[{name}]"), value.clone()))
            })
            .collect();
        self.source = filters.buy_now_only.then(|| own_domain.to_string());
        self.own_domain = Some(own_domain.to_string());
        self
    }

    /// Fetch an explicit token list instead of the whole collection
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<String>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub const fn with_attributes_included(mut self) -> Self {
        self.include_attributes = true;
        self
    }

    /// Tenant domain only used to decide `is_local_listing`
    #[must_use]
    pub fn with_own_domain(mut self, own_domain: &str) -> Self {
        self.own_domain = Some(own_domain.to_string());
        self
    }
}

impl KeyLoader for TokensKey {
    type Item = Token;

    fn endpoint(&self) -> &'static str {
        "tokens"
    }

    fn page_url(&self, index: usize, previous: Option<&Page<Token>>) -> Option<Url> {
        if self.collection_id.is_empty() && self.tokens.is_none() {
            return None;
        }
        let continuation = continuation_for(index, previous)?;

        let mut url = endpoint_url(&self.base, "/tokens/v5");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            if let Some(continuation) = &continuation {
                query.append_pair("continuation", continuation);
            }
            if let Some(source) = &self.source {
                query.append_pair("source", source);
            }
            match &self.tokens {
                Some(tokens) => {
                    for token in tokens {
                        query.append_pair("tokens", token);
                    }
                }
                None => {
                    query.append_pair("collection", &self.collection_id);
                }
            }
            if self.include_attributes {
                query.append_pair("includeAttributes", "true");
            }
            if self.sort.is_none() {
                query.append_pair("sortBy", "floorAskPrice");
            }
            for (key, value) in &self.attributes {
                query.append_pair(key, value);
            }
        }
        Some(url)
    }

    fn decode(&self, body: Value) -> StorefrontResult<Page<Token>> {
        let response: RawTokensResponse = decode_body(self.endpoint(), body)?;
        let Some(tokens) = response.tokens else {
            return Ok(Page::new(Vec::new(), None));
        };
        let own_domain = self.own_domain.as_deref();
        Ok(Page::new(
            tokens
                .into_iter()
                .map(|entry| Token::from_aggregate(entry, own_domain))
                .collect(),
            response.continuation,
        ))
    }
}

/// Sales history (`/sales/v4`)
#[derive(Debug, Clone)]
pub struct SalesKey {
    base: Url,
    collection_id: Option<String>,
    token: Option<String>,
    limit: u32,
}

impl SalesKey {
    pub fn new(base: Url, collection_id: Option<String>, token: Option<String>, limit: u32) -> Self {
        Self {
            base,
            collection_id,
            token,
            limit,
        }
    }
}

#[derive(Deserialize)]
struct SalesResponse {
    #[serde(default)]
    sales: Vec<Sale>,
    #[serde(default)]
    continuation: Option<String>,
}

impl KeyLoader for SalesKey {
    type Item = Sale;

    fn endpoint(&self) -> &'static str {
        "sales"
    }

    fn page_url(&self, index: usize, previous: Option<&Page<Sale>>) -> Option<Url> {
        let continuation = continuation_for(index, previous)?;
        let mut url = endpoint_url(&self.base, "/sales/v4");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            query.append_pair("includeTokenMetadata", "true");
            if let Some(collection) = self.collection_id.as_deref().filter(|c| !c.is_empty()) {
                query.append_pair("collection", collection);
            }
            if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
                query.append_pair("token", token);
            }
            if let Some(continuation) = &continuation {
                query.append_pair("continuation", continuation);
            }
        }
        Some(url)
    }

    fn decode(&self, body: Value) -> StorefrontResult<Page<Sale>> {
        let response: SalesResponse = decode_body(self.endpoint(), body)?;
        Ok(Page::new(response.sales, response.continuation))
    }
}

/// Offers on a token (`/orders/bids/v4`)
#[derive(Debug, Clone)]
pub struct BidsKey {
    base: Url,
    token: String,
    source: Option<String>,
    limit: u32,
}

impl BidsKey {
    pub fn new(base: Url, token: impl Into<String>, limit: u32) -> Self {
        Self {
            base,
            token: token.into(),
            source: None,
            limit,
        }
    }

    /// Restrict to offers made on this domain
    #[must_use]
    pub fn with_source(mut self, domain: &str) -> Self {
        self.source = Some(domain.to_string());
        self
    }
}

#[derive(Deserialize)]
struct BidsResponse {
    #[serde(default)]
    orders: Vec<Bid>,
    #[serde(default)]
    continuation: Option<String>,
}

impl KeyLoader for BidsKey {
    type Item = Bid;

    fn endpoint(&self) -> &'static str {
        "bids"
    }

    fn page_url(&self, index: usize, previous: Option<&Page<Bid>>) -> Option<Url> {
        let continuation = continuation_for(index, previous)?;
        let mut url = endpoint_url(&self.base, "/orders/bids/v4");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.token);
            query.append_pair("limit", &self.limit.to_string());
            query.append_pair("sortBy", "price");
            if let Some(source) = &self.source {
                query.append_pair("source", source);
            }
            if let Some(continuation) = &continuation {
                query.append_pair("continuation", continuation);
            }
        }
        Some(url)
    }

    fn decode(&self, body: Value) -> StorefrontResult<Page<Bid>> {
        let response: BidsResponse = decode_body(self.endpoint(), body)?;
        Ok(Page::new(response.orders, response.continuation))
    }
}

/// Tokens held by a wallet (`/users/{user}/tokens/v5`)
///
/// This endpoint pages by offset. The decoder turns "page was full" into a
/// synthetic continuation holding the next offset so the sequence rules stay
/// the same as for cursor endpoints.
#[derive(Debug, Clone)]
pub struct UserTokensKey {
    base: Url,
    user: String,
    collection_id: Option<String>,
    collection_set_id: Option<String>,
    limit: u32,
}

impl UserTokensKey {
    pub fn new(base: Url, user: impl Into<String>, limit: u32) -> Self {
        Self {
            base,
            user: user.into(),
            collection_id: None,
            collection_set_id: None,
            limit,
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection_id: &str) -> Self {
        self.collection_id = Some(collection_id.to_string());
        self
    }

    /// Takes precedence over a single collection
    #[must_use]
    pub fn with_collection_set(mut self, collection_set_id: &str) -> Self {
        self.collection_set_id = Some(collection_set_id.to_string());
        self
    }

    fn offset(&self, index: usize) -> u64 {
        index as u64 * u64::from(self.limit)
    }
}

impl KeyLoader for UserTokensKey {
    type Item = Token;

    fn endpoint(&self) -> &'static str {
        "user tokens"
    }

    fn page_url(&self, index: usize, previous: Option<&Page<Token>>) -> Option<Url> {
        if self.user.is_empty() {
            return None;
        }
        continuation_for(index, previous)?;
        let mut url = endpoint_url(&self.base, &format!("/users/{}/tokens/v5", self.user));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            query.append_pair("offset", &self.offset(index).to_string());
            if let Some(set) = &self.collection_set_id {
                query.append_pair("collectionsSetId", set);
            } else if let Some(collection) = &self.collection_id {
                query.append_pair("collection", collection);
            }
        }
        Some(url)
    }

    fn decode(&self, body: Value) -> StorefrontResult<Page<Token>> {
        let response: RawUserTokensResponse = decode_body(self.endpoint(), body)?;
        let items: Vec<Token> = response
            .tokens
            .unwrap_or_default()
            .into_iter()
            .map(|entry| Token::from_owned(entry, Some(self.user.as_str())))
            .collect();
        let full = items.len() >= self.limit as usize && !items.is_empty();
        Ok(Page::new(items, full.then(|| "next".to_string())))
    }
}

/// Volume window used to rank collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollectionSort {
    #[default]
    #[serde(rename = "1DayVolume")]
    OneDayVolume,
    #[serde(rename = "7DayVolume")]
    SevenDayVolume,
    #[serde(rename = "30DayVolume")]
    ThirtyDayVolume,
}

impl CollectionSort {
    /// Parse the URL `sort` value; unknown values fall back to one day
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("7DayVolume") => Self::SevenDayVolume,
            Some("30DayVolume") => Self::ThirtyDayVolume,
            _ => Self::OneDayVolume,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneDayVolume => "1DayVolume",
            Self::SevenDayVolume => "7DayVolume",
            Self::ThirtyDayVolume => "30DayVolume",
        }
    }
}

/// Summary row of a collection listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub token_count: Option<String>,
    /// Volumes, floor prices and the rest of the row
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Collections ranked by volume (`/collections/v4`)
#[derive(Debug, Clone)]
pub struct CollectionsKey {
    base: Url,
    sort: CollectionSort,
    limit: u32,
}

impl CollectionsKey {
    pub fn new(base: Url, sort: CollectionSort, limit: u32) -> Self {
        Self { base, sort, limit }
    }
}

#[derive(Deserialize)]
struct CollectionsResponse {
    #[serde(default)]
    collections: Vec<CollectionSummary>,
    #[serde(default)]
    continuation: Option<String>,
}

impl KeyLoader for CollectionsKey {
    type Item = CollectionSummary;

    fn endpoint(&self) -> &'static str {
        "collections"
    }

    fn page_url(&self, index: usize, previous: Option<&Page<CollectionSummary>>) -> Option<Url> {
        let continuation = continuation_for(index, previous)?;
        let mut url = endpoint_url(&self.base, "/collections/v4");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.limit.to_string());
            query.append_pair("sortBy", self.sort.as_str());
            if let Some(continuation) = &continuation {
                query.append_pair("continuation", continuation);
            }
        }
        Some(url)
    }

    fn decode(&self, body: Value) -> StorefrontResult<Page<CollectionSummary>> {
        let response: CollectionsResponse = decode_body(self.endpoint(), body)?;
        Ok(Page::new(response.collections, response.continuation))
    }
}
