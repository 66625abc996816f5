//! Contract of the external order-protocol client
//!
//! Order construction, signing and submission happen outside this crate. The
//! storefront only assembles requests, hands over the wallet's signer and
//! listens to progress events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::expiration::ExpirationPreset;
use super::fees::FeeSchedule;
use crate::amount::Amount;
use crate::currency::{self, Currency};
use crate::error::{StorefrontError, StorefrontResult};
use crate::tenant::Organization;
use crate::token::Token;

/// Error code wallets use when the user rejects a request
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failure reported by the order-protocol client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProtocolError {
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl ProtocolError {
    #[must_use]
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn user_rejected() -> Self {
        Self::new(Some(USER_REJECTED_CODE), "User rejected the request.")
    }

    /// Whether the user declined in their wallet
    #[must_use]
    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(USER_REJECTED_CODE)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{message} (code {code})"),
            (None, Some(message)) => f.write_str(message),
            (Some(code), None) => write!(f, "protocol error code {code}"),
            (None, None) => f.write_str("protocol error"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Status of one item within a progress step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// One step of a multi-step protocol action (approval, signature, fill)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStep {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub items: Vec<ProgressItem>,
}

impl ProgressStep {
    /// First item reports `complete`
    #[must_use]
    pub fn first_item_complete(&self) -> bool {
        self.items
            .first()
            .and_then(|item| item.status.as_deref())
            == Some("complete")
    }
}

/// Callback invoked with the full step list on every progress update
pub type ProgressCallback<'a> = &'a (dyn Fn(&[ProgressStep]) + Send + Sync);

/// Opaque signing capability of the connected wallet
pub trait Signer: Send + Sync {
    /// Address the signer signs for
    fn address(&self) -> &str;
}

/// New listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRequest {
    /// `contract:tokenId`
    pub token: String,
    pub wei_price: String,
    pub currency: String,
    pub expiration_time: i64,
    pub orderbook: String,
    pub order_kind: String,
    pub automated_royalties: bool,
    pub fees: Vec<String>,
}

/// Offer on a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    /// `contract:tokenId`
    pub token: String,
    pub wei_price: String,
    pub currency: String,
    pub expiration_time: i64,
    pub orderbook: String,
    pub order_kind: String,
    pub automated_royalties: bool,
    pub fees: Vec<String>,
}

/// Fill of an existing listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    pub contract: String,
    pub token_id: String,
    pub order_id: Option<String>,
    pub expected_price: Option<f64>,
    pub currency: Option<String>,
}

/// Cancellation of an order the wallet made
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub order_id: String,
}

/// Acceptance of an offer on a token the wallet owns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOfferRequest {
    pub contract: String,
    pub token_id: String,
    pub order_id: String,
    pub expected_price: Option<f64>,
}

/// Marketplace action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    List,
    Buy,
    PlaceBid,
    CancelListing,
    CancelOffer,
    AcceptOffer,
}

impl ActionKind {
    /// Every action kind
    pub const ALL: [Self; 6] = [
        Self::List,
        Self::Buy,
        Self::PlaceBid,
        Self::CancelListing,
        Self::CancelOffer,
        Self::AcceptOffer,
    ];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Buy => "buy",
            Self::PlaceBid => "place bid",
            Self::CancelListing => "cancel listing",
            Self::CancelOffer => "cancel offer",
            Self::AcceptOffer => "accept offer",
        };
        f.write_str(name)
    }
}

/// Request handed to the order-protocol client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "params", rename_all = "camelCase")]
pub enum ActionRequest {
    List(ListingRequest),
    Buy(BuyRequest),
    PlaceBid(BidRequest),
    CancelListing(CancelRequest),
    CancelOffer(CancelRequest),
    AcceptOffer(AcceptOfferRequest),
}

const ORDERBOOK: &str = "reservoir";
const ORDER_KIND: &str = "seaport";

fn token_ref(token: &Token) -> String {
    format!("{}:{}", token.collection_id, token.token_id)
}

fn missing(what: &str) -> StorefrontError {
    StorefrontError::Validation {
        message: format!("{what} is missing"),
    }
}

impl ActionRequest {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::List(_) => ActionKind::List,
            Self::Buy(_) => ActionKind::Buy,
            Self::PlaceBid(_) => ActionKind::PlaceBid,
            Self::CancelListing(_) => ActionKind::CancelListing,
            Self::CancelOffer(_) => ActionKind::CancelOffer,
            Self::AcceptOffer(_) => ActionKind::AcceptOffer,
        }
    }

    /// List `token` at `price` (decimal, in `currency` units)
    pub fn listing(
        organization: &Organization,
        token: &Token,
        price: &str,
        currency: &Currency,
        expiration: ExpirationPreset,
        now: DateTime<Utc>,
    ) -> StorefrontResult<Self> {
        let wei_price = Amount::parse_units(price, currency.decimals)?;
        if wei_price == Amount::ZERO {
            return Err(StorefrontError::Validation {
                message: "listing price must be positive".to_string(),
            });
        }
        let fees = FeeSchedule::for_currency(organization, currency.symbol);
        Ok(Self::List(ListingRequest {
            token: token_ref(token),
            wei_price: wei_price.to_string(),
            currency: currency.contract.to_string(),
            expiration_time: expiration.expiration_time(now)?,
            orderbook: ORDERBOOK.to_string(),
            order_kind: ORDER_KIND.to_string(),
            automated_royalties: fees.automated_royalties(),
            fees: fees.fee_strings(),
        }))
    }

    /// Offer `price` of the network's wrapped native currency on `token`
    pub fn bid(
        organization: &Organization,
        token: &Token,
        price: &str,
        expiration: ExpirationPreset,
        now: DateTime<Utc>,
    ) -> StorefrontResult<Self> {
        let offer_currency = currency::offer_currency_options(organization)
            .first()
            .ok_or_else(|| missing("offer currency"))?;
        let wei_price = Amount::parse_units(price, offer_currency.decimals)?;
        if wei_price == Amount::ZERO {
            return Err(StorefrontError::Validation {
                message: "offer price must be positive".to_string(),
            });
        }
        let fees = FeeSchedule::for_currency(organization, offer_currency.symbol);
        Ok(Self::PlaceBid(BidRequest {
            token: token_ref(token),
            wei_price: wei_price.to_string(),
            currency: offer_currency.contract.to_string(),
            expiration_time: expiration.expiration_time(now)?,
            orderbook: ORDERBOOK.to_string(),
            order_kind: ORDER_KIND.to_string(),
            automated_royalties: fees.automated_royalties(),
            fees: fees.fee_strings(),
        }))
    }

    /// Buy the token's current listing
    pub fn buy(token: &Token) -> StorefrontResult<Self> {
        let listing = token
            .reservoir_listing
            .as_ref()
            .ok_or_else(|| missing("token listing"))?;
        Ok(Self::Buy(BuyRequest {
            contract: token.collection_id.clone(),
            token_id: token.token_id.clone(),
            order_id: listing.order_id.clone(),
            expected_price: listing.price.amount.as_ref().and_then(|a| a.decimal),
            currency: listing.price.currency.as_ref().map(|c| c.contract.clone()),
        }))
    }

    /// Cancel the token's current listing
    pub fn cancel_listing(token: &Token) -> StorefrontResult<Self> {
        let order_id = token
            .reservoir_listing
            .as_ref()
            .and_then(|listing| listing.order_id.clone())
            .ok_or_else(|| missing("listing order id"))?;
        Ok(Self::CancelListing(CancelRequest { order_id }))
    }

    /// Cancel one of the wallet's offers
    pub fn cancel_offer(order_id: &str) -> StorefrontResult<Self> {
        if order_id.is_empty() {
            return Err(missing("offer order id"));
        }
        Ok(Self::CancelOffer(CancelRequest {
            order_id: order_id.to_string(),
        }))
    }

    /// Accept an offer on a token the wallet owns
    pub fn accept_offer(token: &Token, order_id: &str, expected_price: Option<f64>) -> StorefrontResult<Self> {
        if order_id.is_empty() {
            return Err(missing("offer order id"));
        }
        Ok(Self::AcceptOffer(AcceptOfferRequest {
            contract: token.collection_id.clone(),
            token_id: token.token_id.clone(),
            order_id: order_id.to_string(),
            expected_price,
        }))
    }
}

/// External order-protocol client
///
/// Resolves once the action has settled from the client's point of view, or
/// fails with a [`ProtocolError`].
#[async_trait]
pub trait OrderProtocolClient: Send + Sync {
    async fn submit(
        &self,
        request: &ActionRequest,
        signer: &dyn Signer,
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), ProtocolError>;
}
