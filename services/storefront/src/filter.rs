//! Client-side price filtering and token-count reconciliation
//!
//! Price bounds come from the URL as decimal strings in native units and are
//! compared against listing prices in exact 18-decimal base units.
//!
//! Two counts exist for a collection view and they are allowed to disagree:
//! - the grid count is the number of fetched tokens that pass the filters, so
//!   it only covers the pages loaded so far;
//! - the header count comes from collection stats and covers the whole
//!   collection, without the price bounds applied.
//!
//! The grid count is authoritative for what is rendered; the header count is
//! authoritative for "how many items exist". [`reconcile_counts`] derives both.

use serde::Serialize;
use tracing::debug;

use crate::amount::{Amount, NATIVE_DECIMALS};
use crate::query::FilterState;
use crate::read_api::{CollectionStats, SourceStats};
use crate::token::Token;

/// Inclusive price range; a missing side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceBounds {
    pub min: Option<Amount>,
    pub max: Option<Amount>,
}

impl PriceBounds {
    /// Parse raw bounds; malformed values count as absent
    #[must_use]
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Self {
        Self {
            min: parse_bound(min),
            max: parse_bound(max),
        }
    }

    /// Bounds carried by the URL filter state
    #[must_use]
    pub fn from_filters(filters: &FilterState) -> Self {
        Self::parse(filters.min_price.as_deref(), filters.max_price.as_deref())
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether a price satisfies the bounds
    ///
    /// An unpriced item only passes when both bounds are absent.
    #[must_use]
    pub fn admits(&self, price: Option<Amount>) -> bool {
        let Some(price) = price else {
            return self.is_unbounded();
        };
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

fn parse_bound(raw: Option<&str>) -> Option<Amount> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Amount::parse_units(raw, NATIVE_DECIMALS) {
        Ok(amount) => Some(amount),
        Err(error) => {
            debug!(error = %error, "Ignoring malformed price bound");
            None
        }
    }
}

/// Listing price of a token in native base units, if it has a usable one
#[must_use]
pub fn token_price(token: &Token) -> Option<Amount> {
    token.price().and_then(|price| price.native_units().ok().flatten())
}

/// Keep the tokens whose price satisfies `bounds`, preserving order
#[must_use]
pub fn filter_tokens(tokens: &[Token], bounds: &PriceBounds) -> Vec<Token> {
    tokens
        .iter()
        .filter(|token| bounds.admits(token_price(token)))
        .cloned()
        .collect()
}

/// Everything needed to derive the counts for one collection view
#[derive(Debug, Clone, Default)]
pub struct CountInputs<'a> {
    pub stats: Option<&'a CollectionStats>,
    /// This tenant's own marketplace stats
    pub source_stats: Option<&'a SourceStats>,
    pub disable_aggregation: bool,
    pub buy_now_only: bool,
    pub has_attribute_filters: bool,
    /// Tokens fetched so far, before the price filter
    pub fetched: usize,
    /// Tokens fetched so far that pass the price filter
    pub filtered: usize,
}

/// Counts shown for a collection view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    /// Header "N items" count
    pub header: u64,
    /// Number of cards rendered
    pub grid: usize,
}

/// Derive header and grid counts
#[must_use]
pub fn reconcile_counts(inputs: &CountInputs<'_>) -> TokenCounts {
    let mut header = inputs.stats.map_or(0, |s| s.token_count);
    if inputs.buy_now_only {
        header = if inputs.disable_aggregation {
            inputs.source_stats.map_or(0, |s| s.on_sale_count)
        } else {
            inputs.stats.map_or(0, |s| s.on_sale_count)
        };
        if inputs.has_attribute_filters {
            header = inputs.fetched as u64;
        }
    }
    if inputs.filtered == 0 {
        header = 0;
    }
    TokenCounts {
        header,
        grid: inputs.filtered,
    }
}
