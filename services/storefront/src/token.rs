//! Display-normalized tokens and the read API shapes they are built from
//!
//! Two response families feed the same [`Token`] model: aggregate collection
//! tokens (`/tokens/v5`) and per-owner tokens (`/users/{user}/tokens/v5`).
//! They are converted by [`Token::from_aggregate`] and [`Token::from_owned`]
//! respectively. The two differ in how `is_local_listing` is decided: aggregate
//! tokens compare the listing's source domain with the tenant's domain, owned
//! tokens always report `true`.

use serde::{Deserialize, Serialize, Serializer};

use crate::amount::{Amount, NATIVE_DECIMALS};
use crate::error::StorefrontResult;
use crate::tenant::Organization;

/// Currency attached to a read API price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriceCurrency {
    pub contract: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
}

/// Amount attached to a read API price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriceAmount {
    /// Integer base units as a string
    pub raw: String,
    #[serde(default)]
    pub decimal: Option<f64>,
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub native: Option<f64>,
}

/// A price as returned by the read API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub currency: Option<PriceCurrency>,
    #[serde(default)]
    pub amount: Option<PriceAmount>,
}

impl Price {
    /// Price rescaled to native (18-decimal) base units for comparisons
    ///
    /// Returns `Ok(None)` when the price carries no raw amount.
    pub fn native_units(&self) -> StorefrontResult<Option<Amount>> {
        let Some(amount) = &self.amount else {
            return Ok(None);
        };
        if amount.raw.trim().is_empty() {
            return Ok(None);
        }
        let raw = Amount::from_raw(&amount.raw)?;
        let decimals = self
            .currency
            .as_ref()
            .and_then(|c| c.decimals)
            .unwrap_or(NATIVE_DECIMALS);

        let units = raw.as_base_units();
        let rescaled = if decimals <= NATIVE_DECIMALS {
            units.checked_mul(10u128.pow(NATIVE_DECIMALS - decimals))
        } else {
            10u128
                .checked_pow(decimals - NATIVE_DECIMALS)
                .map(|divisor| units / divisor)
        };
        Ok(rescaled.map(Amount::from_base_units))
    }
}

/// Listing time window in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDuration {
    pub start_time_in_seconds: i64,
    pub end_time_in_seconds: Option<i64>,
}

/// Active listing on a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub order_id: Option<String>,
    /// Lower-cased domain of the marketplace that holds the order
    pub source: Option<String>,
    pub source_link: Option<String>,
    pub price: Price,
    /// Whether the order lives on this tenant's own storefront
    pub is_local_listing: bool,
    #[serde(default)]
    pub duration: Option<ListingDuration>,
}

/// Trait value on a token, with optional market aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub token_count: Option<u64>,
    #[serde(default)]
    pub on_sale_count: Option<u64>,
    #[serde(default)]
    pub floor_ask_price: Option<f64>,
    #[serde(default)]
    pub top_bid_value: Option<f64>,
}

/// Display-normalized token
///
/// The price is not stored separately: it is always the listing's price, so a
/// token has a price exactly when it has a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_id: String,
    /// Lower-cased collection contract
    pub collection_id: String,
    pub image: Option<String>,
    pub name: String,
    pub kind: Option<String>,
    pub owner_address: Option<String>,
    pub reservoir_listing: Option<Listing>,
    pub attributes: Option<Vec<TokenAttribute>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecord<'a> {
    token_id: &'a str,
    collection_id: &'a str,
    image: Option<&'a str>,
    name: &'a str,
    kind: Option<&'a str>,
    owner_address: Option<&'a str>,
    price: Option<&'a Price>,
    reservoir_listing: Option<&'a Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a [TokenAttribute]>,
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TokenRecord {
            token_id: &self.token_id,
            collection_id: &self.collection_id,
            image: self.image.as_deref(),
            name: &self.name,
            kind: self.kind.as_deref(),
            owner_address: self.owner_address.as_deref(),
            price: self.price(),
            reservoir_listing: self.reservoir_listing.as_ref(),
            attributes: self.attributes.as_deref(),
        }
        .serialize(serializer)
    }
}

impl Token {
    /// Current ask price, present iff the token is listed
    #[must_use]
    pub fn price(&self) -> Option<&Price> {
        self.reservoir_listing.as_ref().map(|listing| &listing.price)
    }

    /// Price shown on a grid card
    ///
    /// With aggregation disabled only this tenant's own listings show a price.
    #[must_use]
    pub fn display_price(&self, organization: &Organization) -> Option<&Price> {
        let listing = self.reservoir_listing.as_ref()?;
        if !organization.disable_aggregation || listing.is_local_listing {
            Some(&listing.price)
        } else {
            None
        }
    }

    /// Convert an aggregate collection token
    ///
    /// `source` is the tenant's own domain; a listing counts as local when its
    /// source domain matches it.
    #[must_use]
    pub fn from_aggregate(raw: RawTokenEntry, source: Option<&str>) -> Self {
        let info = raw.token.unwrap_or_default();
        let token_id = info.token_id.unwrap_or_default();

        let reservoir_listing = raw
            .market
            .and_then(|market| market.floor_ask)
            .and_then(|ask| {
                let price = ask.price?;
                price.currency.as_ref()?;
                let source_domain = ask
                    .source
                    .and_then(|s| s.domain)
                    .map(|d| d.to_ascii_lowercase());
                let is_local_listing = match (source, source_domain.as_deref()) {
                    (Some(own), Some(domain)) => !own.is_empty() && domain == own,
                    _ => false,
                };
                let duration = ask.valid_from.map(|start| ListingDuration {
                    start_time_in_seconds: start,
                    end_time_in_seconds: ask.valid_until,
                });
                Some(Listing {
                    order_id: ask.id,
                    source: source_domain,
                    source_link: None,
                    price,
                    is_local_listing,
                    duration,
                })
            });

        Self {
            collection_id: collection_id_of(info.collection.as_ref()),
            name: info.name.unwrap_or_else(|| format!("Token #{token_id}")),
            token_id,
            kind: info.kind,
            owner_address: info.owner,
            image: info.image,
            reservoir_listing,
            attributes: info.attributes,
        }
    }

    /// Convert a token held by `owner`
    ///
    /// Listings on owned tokens are always reported as local; see DESIGN.md.
    #[must_use]
    pub fn from_owned(raw: RawUserTokenEntry, owner: Option<&str>) -> Self {
        let info = raw.token.unwrap_or_default();
        let token_id = info.token_id.unwrap_or_default();

        let reservoir_listing = raw
            .ownership
            .and_then(|ownership| ownership.floor_ask)
            .and_then(|ask| ask.price)
            .map(|price| Listing {
                order_id: None,
                source: None,
                source_link: None,
                price,
                is_local_listing: true,
                duration: None,
            });

        Self {
            collection_id: collection_id_of(info.collection.as_ref()),
            name: info.name.unwrap_or_else(|| format!("Token #{token_id}")),
            token_id,
            kind: None,
            owner_address: owner.map(str::to_string),
            image: info.image,
            reservoir_listing,
            attributes: None,
        }
    }
}

/// Attach this tenant's open asks to owned tokens
///
/// An ask whose token set is `token:<contract>:<id>` and whose source is
/// `own_domain` supplies the order id of that token's listing, so it can be
/// cancelled. Returns how many tokens were matched.
pub fn attach_local_asks(tokens: &mut [Token], asks: &[Ask], own_domain: &str) -> usize {
    let mut matched = 0;
    for ask in asks {
        if ask.source_domain().as_deref() != Some(own_domain) {
            continue;
        }
        let Some(set) = ask.token_set_id.as_deref() else {
            continue;
        };
        let Some((contract, token_id)) = set.strip_prefix("token:").and_then(|rest| rest.rsplit_once(':')) else {
            continue;
        };
        for token in tokens.iter_mut().filter(|t| {
            t.token_id == token_id && t.collection_id.eq_ignore_ascii_case(contract)
        }) {
            if let Some(listing) = token.reservoir_listing.as_mut() {
                listing.order_id = Some(ask.id.clone());
                listing.source = Some(own_domain.to_string());
                matched += 1;
            }
        }
    }
    matched
}

fn collection_id_of(collection: Option<&RawCollectionRef>) -> String {
    collection
        .and_then(|c| c.id.as_deref())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// `/tokens/v5` response
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTokensResponse {
    #[serde(default)]
    pub tokens: Option<Vec<RawTokenEntry>>,
    #[serde(default)]
    pub continuation: Option<String>,
}

/// `/users/{user}/tokens/v5` response
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawUserTokensResponse {
    #[serde(default)]
    pub tokens: Option<Vec<RawUserTokenEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenEntry {
    #[serde(default)]
    pub token: Option<RawTokenInfo>,
    #[serde(default)]
    pub market: Option<RawMarket>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawUserTokenEntry {
    #[serde(default)]
    pub token: Option<RawTokenInfo>,
    #[serde(default)]
    pub ownership: Option<RawOwnership>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenInfo {
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub collection: Option<RawCollectionRef>,
    #[serde(default)]
    pub attributes: Option<Vec<TokenAttribute>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawCollectionRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    #[serde(default)]
    pub floor_ask: Option<RawFloorAsk>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawOwnership {
    #[serde(default)]
    pub token_count: Option<String>,
    #[serde(default)]
    pub floor_ask: Option<RawFloorAsk>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawFloorAsk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub source: Option<RawOrderSource>,
    #[serde(default)]
    pub valid_from: Option<i64>,
    #[serde(default)]
    pub valid_until: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderSource {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A completed sale (`/sales/v4`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<serde_json::Value>,
    #[serde(default)]
    pub order_source: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// An open offer (`/orders/bids/v4`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: String,
    #[serde(default)]
    pub maker: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub valid_until: Option<i64>,
    #[serde(default)]
    pub token_set_id: Option<String>,
    #[serde(default)]
    pub source: Option<serde_json::Value>,
}

/// An open ask (`/orders/asks/v3`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ask {
    pub id: String,
    #[serde(default)]
    pub maker: Option<String>,
    #[serde(default)]
    pub token_set_id: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub source: Option<serde_json::Value>,
}

impl Ask {
    /// Domain of the marketplace holding this ask, lower-cased
    #[must_use]
    pub fn source_domain(&self) -> Option<String> {
        self.source
            .as_ref()
            .and_then(|s| s.get("domain"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_ascii_lowercase)
    }
}
