//! Tenant page bootstrap
//!
//! Every handler resolves the tenant from the request host first. Collection
//! routes additionally require the tenant to serve the requested collection,
//! so a collection owned by one tenant never renders under another's host.
//! Read API failures on a page section do not fail the request; the section
//! comes back empty with `fetchError` set.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::HeaderMap,
    response::Json,
};
use tracing::{info, warn};

use super::tenant_host;
use crate::error::StorefrontError;
use crate::fetcher::{BidsKey, KeyLoader, Page, TokensKey, UserTokensKey, fetch_first_page};
use crate::filter::{CountInputs, PriceBounds, filter_tokens, reconcile_counts};
use crate::models::{
    ApiResponse, CollectionPageResponse, OrganizationQuery, OrganizationResponse,
    TokenPageResponse, WalletTokensResponse,
};
use crate::query::{FilterState, RouteQuery};
use crate::server::AppState;
use crate::token::attach_local_asks;

/// Resolved organization for the request host
pub async fn organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OrganizationQuery>,
) -> Result<Json<ApiResponse<OrganizationResponse>>, StorefrontError> {
    let host = tenant_host(&headers)?;
    let organization = state
        .resolver
        .resolve(host, query.collection_id.as_deref())?;
    let read_api_base = organization.read_api_base(&state.config.read_api).to_string();
    Ok(Json(ApiResponse::success(OrganizationResponse {
        chain_id: organization.chain_id(),
        read_api_base,
        organization,
    })))
}

/// First page of a collection view with filters decoded from the URL
pub async fn collection_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(collection_id): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<ApiResponse<CollectionPageResponse>>, StorefrontError> {
    let host = tenant_host(&headers)?;
    let organization = state.resolver.resolve_collection(host, &collection_id)?;
    let query = RouteQuery::parse(raw_query.as_deref().unwrap_or_default());
    let filters = FilterState::decode(&query, organization.disable_aggregation);

    let client = state.read_api(&organization);
    let own_domain = state.resolver.source_domain(host);
    let contract_id = organization.contract_id.clone();
    let loader = TokensKey::new(
        client.base().clone(),
        contract_id.clone(),
        state.config.read_api.tokens_page_limit,
    )
    .with_filters(&filters, &own_domain)
    .with_attributes_included();

    let (stats, source_stats, first_page) = tokio::join!(
        client.collection_stats(&contract_id),
        async {
            if organization.disable_aggregation {
                client.source_stats(&contract_id, &own_domain).await
            } else {
                Ok(None)
            }
        },
        fetch_first_page(&*client, &loader),
    );

    let stats = stats.unwrap_or_else(|e| {
        warn!(collection_id = %contract_id, error = %e, "Collection stats unavailable");
        Default::default()
    });
    let source_stats = source_stats.unwrap_or_else(|e| {
        warn!(collection_id = %contract_id, error = %e, "Source stats unavailable");
        None
    });
    let (page, fetch_error) = match first_page {
        Ok(page) => (page, None),
        Err(e) => {
            warn!(collection_id = %contract_id, error = %e, "First tokens page unavailable");
            (Page::new(Vec::new(), None), Some(e.to_string()))
        }
    };

    let bounds = PriceBounds::from_filters(&filters);
    let tokens = filter_tokens(&page.items, &bounds);
    let counts = reconcile_counts(&CountInputs {
        stats: Some(&stats),
        source_stats: source_stats.as_ref(),
        disable_aggregation: organization.disable_aggregation,
        buy_now_only: filters.buy_now_only,
        has_attribute_filters: filters.has_attribute_filters(),
        fetched: page.items.len(),
        filtered: tokens.len(),
    });

    info!(
        host = %host,
        collection_id = %contract_id,
        fetched = page.items.len(),
        shown = tokens.len(),
        "Rendered collection page"
    );

    Ok(Json(ApiResponse::success(CollectionPageResponse {
        fallback_key: fetch_error.is_none().then(|| loader.cache_key()).flatten(),
        organization,
        filters,
        stats,
        tokens,
        continuation: page.continuation,
        counts,
        fetch_error,
    })))
}

/// Token detail with the first page of offers
pub async fn token_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection_id, token_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TokenPageResponse>>, StorefrontError> {
    let host = tenant_host(&headers)?;
    let organization = state.resolver.resolve_collection(host, &collection_id)?;

    let client = state.read_api(&organization);
    let own_domain = state.resolver.source_domain(host);
    let token_ref = format!("{}:{}", organization.contract_id, token_id);

    let token_loader = TokensKey::new(client.base().clone(), organization.contract_id.clone(), 1)
        .with_tokens(vec![token_ref.clone()])
        .with_attributes_included()
        .with_own_domain(&own_domain);
    let mut bids_loader = BidsKey::new(
        client.base().clone(),
        token_ref,
        state.config.read_api.bids_page_limit,
    );
    if organization.disable_aggregation {
        bids_loader = bids_loader.with_source(&own_domain);
    }

    let (token_page, bids_page) = tokio::join!(
        fetch_first_page(&*client, &token_loader),
        fetch_first_page(&*client, &bids_loader),
    );

    let mut fetch_error = None;
    let token = match token_page {
        Ok(page) => page.items.into_iter().next(),
        Err(e) => {
            warn!(token_id = %token_id, error = %e, "Token unavailable");
            fetch_error = Some(e.to_string());
            None
        }
    };
    let bids = match bids_page {
        Ok(page) => page,
        Err(e) => {
            warn!(token_id = %token_id, error = %e, "Offers unavailable");
            if fetch_error.is_none() {
                fetch_error = Some(e.to_string());
            }
            Page::new(Vec::new(), None)
        }
    };

    Ok(Json(ApiResponse::success(TokenPageResponse {
        organization,
        token,
        bids: bids.items,
        bids_continuation: bids.continuation,
        fetch_error,
    })))
}

/// First page of the tokens a wallet holds in this tenant's collections
pub async fn wallet_tokens(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<WalletTokensResponse>>, StorefrontError> {
    let host = tenant_host(&headers)?;
    let organization = state.resolver.resolve(host, None)?;
    let address = address.to_ascii_lowercase();

    let client = state.read_api(&organization);
    let mut loader = UserTokensKey::new(
        client.base().clone(),
        address.clone(),
        state.config.read_api.tokens_page_limit,
    );
    loader = match &organization.reservoir_collection_set_id {
        Some(set) => loader.with_collection_set(set),
        None => loader.with_collection(&organization.contract_id),
    };

    let (page, asks) = tokio::join!(
        fetch_first_page(&*client, &loader),
        client.asks(None, Some(&address)),
    );
    let (mut page, fetch_error) = match page {
        Ok(page) => (page, None),
        Err(e) => {
            warn!(user = %address, error = %e, "Wallet tokens unavailable");
            (Page::new(Vec::new(), None), Some(e.to_string()))
        }
    };
    let asks = asks.unwrap_or_else(|e| {
        warn!(maker = %address, error = %e, "Asks unavailable");
        Vec::new()
    });
    let own_domain = state.resolver.source_domain(host);
    let local_listings = attach_local_asks(&mut page.items, &asks, &own_domain);

    Ok(Json(ApiResponse::success(WalletTokensResponse {
        fallback_key: fetch_error.is_none().then(|| loader.cache_key()).flatten(),
        organization,
        tokens: page.items,
        continuation: page.continuation,
        local_listings,
        fetch_error,
    })))
}

/// Ask the read API to re-index a collection served by this tenant
pub async fn refresh_collection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(collection_id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, StorefrontError> {
    let host = tenant_host(&headers)?;
    let organization = state.resolver.resolve_collection(host, &collection_id)?;
    state
        .read_api(&organization)
        .refresh_collection(&organization.contract_id)
        .await?;
    Ok(Json(ApiResponse::success(true)))
}
