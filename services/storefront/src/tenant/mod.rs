//! Tenant (organization) configuration and hostname resolution
//!
//! A request's `Host` header selects a base organization record. Resolution then
//! layers, in order:
//! 1. the base record from the tenant source,
//! 2. the `development` override block (non-production mode only),
//! 3. the selected collection's fields (explicit collection id, or the first
//!    collection in non-production mode when none was requested).
//!
//! Each layer shallow-overwrites the previous one and yields a fresh record; the
//! source table is never mutated.

pub mod table;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ReadApiConfig;
use crate::currency::CurrencySymbol;
use crate::error::{StorefrontError, StorefrontResult};

pub use table::StaticTenantTable;

/// A collection served by a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Display name
    pub name: String,
    /// Contract address of the collection
    pub contract_id: String,
    /// Icon shown next to listings
    pub listing_icon: String,
    /// Royalty override for this collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee: Option<f64>,
    /// Royalty recipient override for this collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee_recipient: Option<String>,
    /// Savings rate override for this collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_rate: Option<f64>,
}

/// Per-currency fee overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyOption {
    pub symbol: CurrencySymbol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee_recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_fee_recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_rate: Option<f64>,
}

/// Override block applied outside production
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentOverride {
    /// Replaces the whole collections list
    pub collections: Vec<CollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet_network: Option<bool>,
}

/// Presentation tokens (colors, fonts, icons, radii) carried through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme(Map<String, Value>);

impl Theme {
    /// Build from a JSON object
    #[must_use]
    pub const fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    /// Raw presentation values
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Tenant configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub name: String,
    /// Contract of the active collection after resolution
    pub contract_id: String,
    pub listing_icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    /// Member collections
    pub collections: Vec<CollectionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservoir_collection_set_id: Option<String>,

    /// Hide listings from other marketplaces
    #[serde(default)]
    pub disable_aggregation: bool,
    #[serde(default)]
    pub combine_fees_in_ui: bool,
    #[serde(default)]
    pub hide_powered_by_snag: bool,
    #[serde(default)]
    pub beta_tag: bool,
    #[serde(default)]
    pub disable_banned_on_open_sea: bool,

    /// Point at the test network instead of mainnet
    #[serde(default)]
    pub testnet_network: bool,

    /// Public URL of the storefront
    pub url: String,
    pub home_url: String,

    pub royalty_fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_fee_recipient: Option<String>,
    pub service_fee: f64,
    pub service_fee_recipient: String,
    pub savings_rate: f64,

    /// Extra listing currencies beyond the native one
    #[serde(default)]
    pub currencies: Vec<CurrencyOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development: Option<DevelopmentOverride>,

    /// Everything else in the record is presentation data
    #[serde(flatten)]
    pub theme: Theme,
}

/// Network an organization trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Chain {
    Mainnet,
    Testnet,
}

impl Chain {
    /// EVM chain id
    #[must_use]
    pub const fn id(&self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Testnet => 5,
        }
    }
}

impl Organization {
    /// Network selected by the `testnetNetwork` flag
    #[must_use]
    pub const fn chain(&self) -> Chain {
        if self.testnet_network {
            Chain::Testnet
        } else {
            Chain::Mainnet
        }
    }

    /// EVM chain id for wallet network checks
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain().id()
    }

    /// Read API base URL for this organization's network
    #[must_use]
    pub fn read_api_base<'a>(&self, read_api: &'a ReadApiConfig) -> &'a str {
        match self.chain() {
            Chain::Mainnet => &read_api.mainnet_base_url,
            Chain::Testnet => &read_api.testnet_base_url,
        }
    }

    /// Find a member collection by contract id (case-insensitive)
    #[must_use]
    pub fn find_collection(&self, contract_id: &str) -> Option<&CollectionConfig> {
        self.collections
            .iter()
            .find(|c| c.contract_id.eq_ignore_ascii_case(contract_id))
    }

    /// Development layer: returns a new record with the override applied
    #[must_use]
    pub fn with_development_override(&self, overrides: &DevelopmentOverride) -> Self {
        let mut merged = self.clone();
        merged.collections = overrides.collections.clone();
        if let Some(royalty_fee) = overrides.royalty_fee {
            merged.royalty_fee = royalty_fee;
        }
        if let Some(service_fee) = overrides.service_fee {
            merged.service_fee = service_fee;
        }
        if let Some(testnet) = overrides.testnet_network {
            merged.testnet_network = testnet;
        }
        merged
    }

    /// Collection layer: returns a new record with the collection's fields applied
    #[must_use]
    pub fn with_collection(&self, collection: &CollectionConfig) -> Self {
        let mut merged = self.clone();
        merged.name = collection.name.clone();
        merged.contract_id = collection.contract_id.clone();
        merged.listing_icon = collection.listing_icon.clone();
        if let Some(royalty_fee) = collection.royalty_fee {
            merged.royalty_fee = royalty_fee;
        }
        if let Some(recipient) = &collection.royalty_fee_recipient {
            merged.royalty_fee_recipient = Some(recipient.clone());
        }
        if let Some(savings_rate) = collection.savings_rate {
            merged.savings_rate = savings_rate;
        }
        merged
    }

    /// Whether the resolved record serves `collection_id` as its active collection
    #[must_use]
    pub fn serves_collection(&self, collection_id: &str) -> bool {
        self.contract_id.eq_ignore_ascii_case(collection_id)
    }
}

/// Source of base tenant records keyed by hostname
///
/// Implementations may be a static table or a per-tenant datastore; the
/// resolver only needs lookups.
pub trait TenantSource: Send + Sync {
    /// Base record for an exact (normalized) hostname
    fn organization(&self, hostname: &str) -> Option<Organization>;
}

/// Deployment mode driving the development override layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    /// Anything that is not production applies development layers
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Resolves hostnames (and optional collection ids) to merged organizations
#[derive(Clone)]
pub struct TenantResolver {
    source: Arc<dyn TenantSource>,
    mode: RuntimeMode,
    local_suffix: String,
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantResolver")
            .field("source", &"Arc<dyn TenantSource>")
            .field("mode", &self.mode)
            .field("local_suffix", &self.local_suffix)
            .finish()
    }
}

impl TenantResolver {
    /// Create a resolver over a tenant source
    pub fn new(source: Arc<dyn TenantSource>, mode: RuntimeMode, local_suffix: impl Into<String>) -> Self {
        Self {
            source,
            mode,
            local_suffix: local_suffix.into(),
        }
    }

    /// Deployment mode in effect
    #[must_use]
    pub const fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Strip the local-development suffix and lower-case the host
    #[must_use]
    pub fn normalize_hostname(&self, hostname: &str) -> String {
        let host = hostname.trim().to_ascii_lowercase();
        if self.local_suffix.is_empty() {
            return host;
        }
        match host.strip_suffix(&self.local_suffix.to_ascii_lowercase()) {
            Some(stripped) => stripped.to_string(),
            None => host,
        }
    }

    /// Domain the read API records on this tenant's own listings
    ///
    /// Taken from the request host, not the organization's `url`, so a
    /// tenant served under several hosts sees its listings per host.
    #[must_use]
    pub fn source_domain(&self, hostname: &str) -> String {
        self.normalize_hostname(hostname)
    }

    /// Resolve a hostname and optional collection id to a merged organization
    ///
    /// A collection id that is not a member of the tenant does not fail here;
    /// use [`TenantResolver::resolve_collection`] where the route demands a
    /// specific collection.
    pub fn resolve(
        &self,
        hostname: &str,
        collection_id: Option<&str>,
    ) -> StorefrontResult<Organization> {
        let normalized = self.normalize_hostname(hostname);
        let Some(base) = self.source.organization(&normalized) else {
            warn!(hostname = %normalized, "No organization configured for host");
            return Err(StorefrontError::TenantNotFound {
                hostname: normalized,
            });
        };

        let mut organization = base;
        if !self.mode.is_production() {
            if let Some(overrides) = organization.development.clone() {
                organization = organization.with_development_override(&overrides);
            }
        }

        match collection_id.filter(|id| !id.is_empty()) {
            Some(requested) => {
                if let Some(collection) = organization.find_collection(requested).cloned() {
                    organization = organization.with_collection(&collection);
                }
            }
            None => {
                if !self.mode.is_production() {
                    if let Some(first) = organization.collections.first().cloned() {
                        organization = organization.with_collection(&first);
                    }
                }
            }
        }

        debug!(
            hostname = %normalized,
            contract_id = %organization.contract_id,
            "Resolved organization"
        );
        Ok(organization)
    }

    /// Resolve and require that the tenant serves `collection_id`
    ///
    /// Prevents one tenant's collection pages from rendering under another
    /// tenant's hostname.
    pub fn resolve_collection(
        &self,
        hostname: &str,
        collection_id: &str,
    ) -> StorefrontResult<Organization> {
        let organization = self.resolve(hostname, Some(collection_id))?;
        if !organization.serves_collection(collection_id) {
            warn!(
                hostname = %hostname,
                collection_id = %collection_id,
                "Collection not served by tenant"
            );
            return Err(StorefrontError::CollectionNotOwned {
                hostname: self.normalize_hostname(hostname),
                collection_id: collection_id.to_string(),
            });
        }
        Ok(organization)
    }
}
