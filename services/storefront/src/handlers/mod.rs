//! HTTP handlers

pub mod health;
pub mod social;
pub mod stats;
pub mod storefront;

use axum::http::HeaderMap;

use crate::error::{StorefrontError, StorefrontResult};
use crate::middleware::request_host;

/// Hostname a tenant is resolved from
fn tenant_host(headers: &HeaderMap) -> StorefrontResult<&str> {
    request_host(headers).ok_or_else(|| StorefrontError::Validation {
        message: "request has no Host header".to_string(),
    })
}
