//! Supported currencies and per-tenant currency allow-lists

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tenant::Organization;

/// The zero address used by the read API for the native currency
pub const NATIVE_CURRENCY_CONTRACT: &str = "0x0000000000000000000000000000000000000000";

/// Currency symbols the storefront knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencySymbol {
    /// Native ether
    Eth,
    /// ApeCoin
    Ape,
    /// Solana-bridged token
    Sol,
    /// Go APE
    Goape,
    /// Wrapped ether, used for offers
    Weth,
}

impl CurrencySymbol {
    /// Ticker as displayed and as sent in query strings
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eth => "ETH",
            Self::Ape => "APE",
            Self::Sol => "SOL",
            Self::Goape => "GOAPE",
            Self::Weth => "WETH",
        }
    }
}

impl fmt::Display for CurrencySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static catalog entry for an on-chain currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Currency {
    /// ERC-20 contract, or the zero address for the native currency
    pub contract: &'static str,
    /// Display name
    pub name: &'static str,
    /// Ticker
    pub symbol: CurrencySymbol,
    /// Decimals of the base unit
    pub decimals: u32,
}

impl Currency {
    /// Whether this is the chain's native currency
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.contract == NATIVE_CURRENCY_CONTRACT
    }
}

/// Currencies accepted for listings and purchases
pub const SUPPORTED_CURRENCIES: &[Currency] = &[
    Currency {
        contract: NATIVE_CURRENCY_CONTRACT,
        name: "Ether",
        symbol: CurrencySymbol::Eth,
        decimals: 18,
    },
    Currency {
        contract: "0x4d224452801ACEd8B2F0aebE155379bb5D594381",
        name: "ApeCoin",
        symbol: CurrencySymbol::Ape,
        decimals: 18,
    },
    Currency {
        contract: "0xABA4DA2fFBdC773C5EE0A98Bae496e8a82E7b6e4",
        name: "Go APE",
        symbol: CurrencySymbol::Goape,
        decimals: 18,
    },
];

/// Offer currencies on mainnet
pub const SUPPORTED_OFFERS_CURRENCIES: &[Currency] = &[Currency {
    contract: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
    name: "Wrapped",
    symbol: CurrencySymbol::Weth,
    decimals: 18,
}];

/// Offer currencies on the test network
pub const TESTNET_SUPPORTED_OFFERS_CURRENCIES: &[Currency] = &[Currency {
    contract: "0xb4fbf271143f4fbf7b91a5ded31805e42b2208d6",
    name: "Wrapped",
    symbol: CurrencySymbol::Weth,
    decimals: 18,
}];

/// The native currency entry
#[must_use]
pub fn native_currency() -> &'static Currency {
    &SUPPORTED_CURRENCIES[0]
}

/// Find a listing currency by its contract address (case-insensitive)
#[must_use]
pub fn find_by_contract(contract: &str) -> Option<&'static Currency> {
    SUPPORTED_CURRENCIES
        .iter()
        .chain(SUPPORTED_OFFERS_CURRENCIES)
        .chain(TESTNET_SUPPORTED_OFFERS_CURRENCIES)
        .find(|c| c.contract.eq_ignore_ascii_case(contract))
}

/// Find a listing currency by symbol
#[must_use]
pub fn find_by_symbol(symbol: CurrencySymbol) -> Option<&'static Currency> {
    SUPPORTED_CURRENCIES.iter().find(|c| c.symbol == symbol)
}

/// Listing currencies offered to a tenant: native plus the tenant's declared extras
#[must_use]
pub fn currency_options(organization: &Organization) -> Vec<&'static Currency> {
    let mut symbols = vec![CurrencySymbol::Eth];
    symbols.extend(organization.currencies.iter().map(|c| c.symbol));
    SUPPORTED_CURRENCIES
        .iter()
        .filter(|currency| symbols.contains(&currency.symbol))
        .collect()
}

/// Offer currencies for the tenant's network
#[must_use]
pub fn offer_currency_options(organization: &Organization) -> &'static [Currency] {
    if organization.testnet_network {
        TESTNET_SUPPORTED_OFFERS_CURRENCIES
    } else {
        SUPPORTED_OFFERS_CURRENCIES
    }
}
