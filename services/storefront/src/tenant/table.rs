//! Static hostname → organization table loaded at startup

use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::info;

use super::{Organization, TenantSource};
use crate::error::{StorefrontError, StorefrontResult};

/// Immutable tenant table
#[derive(Debug, Clone, Default)]
pub struct StaticTenantTable {
    organizations: FxHashMap<String, Organization>,
}

impl StaticTenantTable {
    /// Build from `(hostname, organization)` pairs; hostnames are lower-cased
    pub fn from_organizations<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Organization)>,
        S: AsRef<str>,
    {
        let organizations = entries
            .into_iter()
            .map(|(host, organization)| (host.as_ref().trim().to_ascii_lowercase(), organization))
            .collect();
        Self { organizations }
    }

    /// Load a JSON object of hostname → organization
    pub fn from_file(path: impl AsRef<Path>) -> StorefrontResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StorefrontError::Configuration {
            message: format!("failed to read tenant table {}: {e}", path.display()),
        })?;
        let table = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            tenants = table.len(),
            "Loaded tenant table"
        );
        Ok(table)
    }

    /// Parse a JSON object of hostname → organization
    pub fn from_json(raw: &str) -> StorefrontResult<Self> {
        let entries: FxHashMap<String, Organization> =
            serde_json::from_str(raw).map_err(|e| StorefrontError::Configuration {
                message: format!("invalid tenant table: {e}"),
            })?;
        Ok(Self::from_organizations(entries))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }

    /// Configured hostnames
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.organizations.keys().map(String::as_str)
    }
}

impl TenantSource for StaticTenantTable {
    fn organization(&self, hostname: &str) -> Option<Organization> {
        self.organizations.get(hostname).cloned()
    }
}
