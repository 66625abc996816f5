//! Error types for the storefront

use axum::http::StatusCode;
use thiserror::Error;

/// Storefront-specific error types
#[derive(Error, Debug)]
pub enum StorefrontError {
    /// No tenant is configured for the request hostname
    #[error("No organization configured for host: {hostname}")]
    TenantNotFound {
        /// The normalized hostname that was looked up
        hostname: String,
    },

    /// The requested collection does not belong to the resolved tenant
    #[error("Collection {collection_id} is not served by {hostname}")]
    CollectionNotOwned {
        /// Hostname the request arrived on
        hostname: String,
        /// Collection id that was requested
        collection_id: String,
    },

    /// The read API answered with a non-success status
    #[error("Read API returned {status}: {message}")]
    ReadApi {
        /// HTTP status returned by the read API
        status: u16,
        /// Body or reason reported by the read API
        message: String,
    },

    /// Transport-level failure talking to the read API
    #[error("Read API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A read API payload could not be decoded
    #[error("Failed to decode {endpoint} response: {reason}")]
    Decode {
        /// Endpoint family whose payload failed to decode
        endpoint: String,
        /// Decoder error
        reason: String,
    },

    /// A decimal amount could not be parsed into base units
    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount {
        /// The offending input
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// The ETH price feed failed or reported an error
    #[error("Price feed error: {message}")]
    PriceFeed {
        /// Reason reported by the feed
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Configuration error message detailing what went wrong
        message: String,
    },

    /// Persistence layer error
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Request validation error
    #[error("Validation error: {message}")]
    Validation {
        /// Detailed validation error message
        message: String,
    },
}

impl StorefrontError {
    /// HTTP status used when this error reaches a handler
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::TenantNotFound { .. } | Self::CollectionNotOwned { .. } => StatusCode::NOT_FOUND,
            Self::ReadApi { .. }
            | Self::Transport(_)
            | Self::Decode { .. }
            | Self::PriceFeed { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidAmount { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } | Self::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for the error envelope
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TenantNotFound { .. } => "TENANT_NOT_FOUND",
            Self::CollectionNotOwned { .. } => "COLLECTION_NOT_FOUND",
            Self::ReadApi { .. } => "READ_API_ERROR",
            Self::Transport(_) => "READ_API_UNAVAILABLE",
            Self::Decode { .. } => "READ_API_DECODE_ERROR",
            Self::PriceFeed { .. } => "PRICE_FEED_ERROR",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    /// Whether this error means the page should render as not-found
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TenantNotFound { .. } | Self::CollectionNotOwned { .. }
        )
    }
}

/// Type alias for storefront results
pub type StorefrontResult<T> = Result<T, StorefrontError>;
