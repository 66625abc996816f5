//! REST API models and request/response types

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::StorefrontError;
use crate::filter::TokenCounts;
use crate::query::FilterState;
use crate::read_api::CollectionStats;
use crate::tenant::Organization;
use crate::token::{Bid, Token};

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    pub details: Option<FxHashMap<String, String>>,
}

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error details (if failed)
    pub error: Option<ErrorResponse>,
    /// Response timestamp
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    /// Create a successful API response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Create an error API response
    #[must_use]
    pub fn error(error: ErrorResponse) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl From<&StorefrontError> for ErrorResponse {
    fn from(error: &StorefrontError) -> Self {
        let details = match error {
            StorefrontError::TenantNotFound { hostname } => {
                Some([("hostname".to_string(), hostname.clone())].into_iter().collect())
            }
            StorefrontError::CollectionNotOwned {
                hostname,
                collection_id,
            } => Some(
                [
                    ("hostname".to_string(), hostname.clone()),
                    ("collection_id".to_string(), collection_id.clone()),
                ]
                .into_iter()
                .collect(),
            ),
            StorefrontError::ReadApi { status, .. } => {
                Some([("upstream_status".to_string(), status.to_string())].into_iter().collect())
            }
            _ => None,
        };
        Self {
            error: error.code().to_string(),
            message: error.to_string(),
            details,
        }
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::<()>::error(ErrorResponse::from(&self));
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Configured tenant count
    pub tenants: usize,
    /// Service version
    pub version: String,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}

/// `GET /api/organization` query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationQuery {
    pub collection_id: Option<String>,
}

/// Resolved tenant with its derived chain settings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub organization: Organization,
    pub chain_id: u64,
    pub read_api_base: String,
}

/// Server-rendered first page of a collection view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPageResponse {
    pub organization: Organization,
    pub filters: FilterState,
    pub stats: CollectionStats,
    /// First page, already price-filtered
    pub tokens: Vec<Token>,
    pub continuation: Option<String>,
    /// Cache key the first page was fetched under
    pub fallback_key: Option<String>,
    pub counts: TokenCounts,
    /// Set when the first page could not be fetched
    pub fetch_error: Option<String>,
}

/// Server-rendered token detail
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPageResponse {
    pub organization: Organization,
    pub token: Option<Token>,
    /// First page of offers
    pub bids: Vec<Bid>,
    pub bids_continuation: Option<String>,
    pub fetch_error: Option<String>,
}

/// Server-rendered first page of a wallet's tokens
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTokensResponse {
    pub organization: Organization,
    pub tokens: Vec<Token>,
    pub continuation: Option<String>,
    pub fallback_key: Option<String>,
    /// Tokens whose listing lives on this storefront
    pub local_listings: usize,
    pub fetch_error: Option<String>,
}

/// `GET /api/wallet_token_activities` query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub collection_id: String,
    pub token_id: String,
    pub wallet_address: String,
}

/// `GET /api/activities` filters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesQuery {
    pub collection_id: Option<String>,
    pub token_id: Option<String>,
}

/// `POST /api/wallet_token_activities` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub collection_id: String,
    pub token_id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub like: Option<bool>,
    #[serde(default)]
    pub view: Option<bool>,
}
