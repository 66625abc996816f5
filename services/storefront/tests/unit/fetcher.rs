//! Paginated fetcher tests

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use storefront::StorefrontError;
use storefront::fetcher::{
    CacheInvalidator, InfiniteQuery, KeyLoader, LoadOutcome, Page, PageCache, SalesKey, TokensKey,
    UserTokensKey, fetch_first_page,
};
use storefront::query::{FilterState, RouteQuery};
use storefront::token::Token;

use crate::common::*;

fn base() -> Url {
    Url::parse("https://read.example/api").unwrap()
}

/// Two pages: `c1` continues, the second ends the sequence
fn two_page_source() -> MockPageSource {
    MockPageSource::new(|url| {
        let second = url.query_pairs().any(|(k, v)| k == "continuation" && v == "c1");
        if second {
            Ok(json!({
                "tokens": [raw_token(COLLECTION_A, "3", Some("3000"), "apes.shop.xyz")],
                "continuation": null
            }))
        } else {
            Ok(json!({
                "tokens": [
                    raw_token(COLLECTION_A, "1", Some("1000"), "apes.shop.xyz"),
                    raw_token(COLLECTION_A, "2", None, "apes.shop.xyz")
                ],
                "continuation": "c1"
            }))
        }
    })
}

fn tokens_query(source: Arc<MockPageSource>) -> InfiniteQuery<TokensKey> {
    InfiniteQuery::new(
        source,
        Arc::new(PageCache::new()),
        TokensKey::new(base(), COLLECTION_A, 20),
    )
}

#[tokio::test]
async fn test_pagination_stops_at_terminal_page() {
    init_test_env();
    let source = Arc::new(two_page_source());
    let query = tokens_query(Arc::clone(&source));

    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 0, items: 2 }));
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 1, items: 1 }));
    for _ in 0..3 {
        assert!(matches!(query.load_more().await, LoadOutcome::Exhausted));
    }
    assert_eq!(source.requests(), 2);
    assert!(query.snapshot().is_exhausted());

    let ids: Vec<String> = query.items().into_iter().map(|t| t.token_id).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_empty_page_ends_sequence() {
    let source = Arc::new(MockPageSource::new(|_| {
        Ok(json!({ "tokens": [], "continuation": "still-here" }))
    }));
    let query = tokens_query(Arc::clone(&source));
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 0, items: 0 }));
    assert!(matches!(query.load_more().await, LoadOutcome::Exhausted));
    assert_eq!(source.requests(), 1);
}

#[tokio::test]
async fn test_one_request_in_flight_per_key() {
    init_test_env();
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(two_page_source().gated(Arc::clone(&gate)));
    let query = Arc::new(tokens_query(Arc::clone(&source)));

    let pending = tokio::spawn({
        let query = Arc::clone(&query);
        async move { query.load_more().await }
    });
    while !query.snapshot().in_flight {
        tokio::task::yield_now().await;
    }

    assert!(matches!(query.load_more().await, LoadOutcome::Busy));
    assert_eq!(source.requests(), 1);

    gate.add_permits(1);
    assert!(matches!(pending.await.unwrap(), LoadOutcome::Loaded { index: 0, .. }));
    assert!(!query.snapshot().in_flight);
}

#[tokio::test]
async fn test_response_for_abandoned_key_is_dropped() {
    init_test_env();
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(two_page_source().gated(Arc::clone(&gate)));
    let cache = Arc::new(PageCache::new());
    let query = Arc::new(InfiniteQuery::new(
        Arc::clone(&source) as Arc<dyn storefront::fetcher::PageSource>,
        Arc::clone(&cache),
        TokensKey::new(base(), COLLECTION_A, 20),
    ));
    let old_key = query.active_key().unwrap();

    let pending = tokio::spawn({
        let query = Arc::clone(&query);
        async move { query.load_more().await }
    });
    while !query.snapshot().in_flight {
        tokio::task::yield_now().await;
    }

    let filters = FilterState::decode(&RouteQuery::parse("sort=rarity"), false);
    let changed = query.set_loader(TokensKey::new(base(), COLLECTION_A, 20).with_filters(&filters, "apes.shop.xyz"));
    assert!(changed);
    assert!(query.items().is_empty());

    gate.add_permits(1);
    assert!(matches!(pending.await.unwrap(), LoadOutcome::Stale));

    let old = cache.snapshot(&old_key);
    assert!(old.pages.is_empty());
    assert!(!old.in_flight);
}

#[tokio::test]
async fn test_invalidation_discards_in_flight_page() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(two_page_source().gated(Arc::clone(&gate)));
    let cache: Arc<PageCache<Token>> = Arc::new(PageCache::new());
    let query = Arc::new(InfiniteQuery::new(
        Arc::clone(&source) as Arc<dyn storefront::fetcher::PageSource>,
        Arc::clone(&cache),
        TokensKey::new(base(), COLLECTION_A, 20),
    ));

    let pending = tokio::spawn({
        let query = Arc::clone(&query);
        async move { query.load_more().await }
    });
    while !query.snapshot().in_flight {
        tokio::task::yield_now().await;
    }
    query.revalidate();
    gate.add_permits(1);
    assert!(matches!(pending.await.unwrap(), LoadOutcome::Stale));
    assert!(query.items().is_empty());

    gate.add_permits(1);
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 0, .. }));
    assert_eq!(query.snapshot().epoch, 1);
}

#[tokio::test]
async fn test_failed_page_stays_unfetched() {
    let source = Arc::new(MockPageSource::new(|_| {
        Err(StorefrontError::ReadApi {
            status: 503,
            message: "unavailable".into(),
        })
    }));
    let query = tokens_query(Arc::clone(&source));
    assert!(matches!(query.load_more().await, LoadOutcome::Failed(_)));
    let snapshot = query.snapshot();
    assert!(snapshot.pages.is_empty());
    assert!(snapshot.error.is_some());
    assert!(!snapshot.in_flight);

    // the next visibility signal retries the same page
    assert!(matches!(query.load_more().await, LoadOutcome::Failed(_)));
    assert_eq!(source.requests(), 2);
}

#[tokio::test]
async fn test_fallback_seeds_first_page() {
    let source = Arc::new(two_page_source());
    let loader = TokensKey::new(base(), COLLECTION_A, 20);
    let key = loader.cache_key().unwrap();
    let first = fetch_first_page(source.as_ref(), &loader).await.unwrap();
    assert_eq!(first.continuation.as_deref(), Some("c1"));

    let query = tokens_query(Arc::clone(&source)).with_fallback(&key, first);
    assert_eq!(query.items().len(), 2);
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 1, items: 1 }));
    assert_eq!(source.requests(), 2);
}

#[tokio::test]
async fn test_fallback_for_other_key_is_ignored() {
    let source = Arc::new(two_page_source());
    let query = tokens_query(Arc::clone(&source))
        .with_fallback("https://read.example/other", Page::new(Vec::new(), None));
    assert!(query.items().is_empty());
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { index: 0, .. }));
}

#[test]
fn test_invalidate_where_matches_collection() {
    let cache: PageCache<Token> = PageCache::new();
    let a = TokensKey::new(base(), COLLECTION_A, 20).cache_key().unwrap();
    let b = TokensKey::new(base(), COLLECTION_B, 20).cache_key().unwrap();
    assert!(cache.seed(&a, Page::new(vec![listed_token(COLLECTION_A, "1", Some("1"))], None)));
    assert!(cache.seed(&b, Page::new(Vec::new(), None)));

    let invalidated = cache.invalidate_where(&|key| key.contains(COLLECTION_A));
    assert_eq!(invalidated, 1);
    assert!(cache.snapshot(&a).pages.is_empty());
    assert_eq!(cache.snapshot(&b).pages.len(), 1);
}

#[test]
fn test_token_key_parameters() {
    let filters = FilterState::decode(
        &RouteQuery::parse("attributes%5BHat%5D=cap&buyNow=true"),
        false,
    );
    let url = TokensKey::new(base(), COLLECTION_A, 20)
        .with_filters(&filters, "apes.shop.xyz")
        .page_url(0, None)
        .unwrap();
    assert_eq!(url.path(), "/api/tokens/v5");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("source".into(), "apes.shop.xyz".into())));
    assert!(pairs.contains(&("sortBy".into(), "floorAskPrice".into())));
    assert!(pairs.contains(&("attributes[Hat]".into(), "cap".into())));
    assert!(pairs.contains(&("collection".into(), COLLECTION_A.into())));
}

#[test]
fn test_parameter_change_changes_key() {
    let plain = TokensKey::new(base(), COLLECTION_A, 20).cache_key();
    let sorted = TokensKey::new(base(), COLLECTION_A, 20)
        .with_filters(&FilterState::decode(&RouteQuery::parse("sort=x"), false), "d")
        .cache_key();
    assert_ne!(plain, sorted);
    assert_eq!(plain, TokensKey::new(base(), COLLECTION_A, 20).cache_key());
}

#[test]
fn test_sales_without_target_has_no_key() {
    assert!(SalesKey::new(base(), None, None, 10).cache_key().is_none());
}

#[tokio::test]
async fn test_user_tokens_offset_paging() {
    let source = Arc::new(MockPageSource::new(|url| {
        let offset = url
            .query_pairs()
            .find(|(k, _)| k == "offset")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let tokens = if offset == "0" {
            json!([
                { "token": { "tokenId": "1", "collection": { "id": COLLECTION_A } } },
                { "token": { "tokenId": "2", "collection": { "id": COLLECTION_A } } }
            ])
        } else {
            json!([{ "token": { "tokenId": "3", "collection": { "id": COLLECTION_A } } }])
        };
        Ok(json!({ "tokens": tokens }))
    }));
    let query = InfiniteQuery::new(
        Arc::clone(&source) as Arc<dyn storefront::fetcher::PageSource>,
        Arc::new(PageCache::new()),
        UserTokensKey::new(base(), "0xowner", 2).with_collection(COLLECTION_A),
    );
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { items: 2, .. }));
    assert!(matches!(query.load_more().await, LoadOutcome::Loaded { items: 1, .. }));
    assert!(matches!(query.load_more().await, LoadOutcome::Exhausted));
    assert!(source.urls()[1].contains("offset=2"));
    assert!(query.items().iter().all(|t| t.owner_address.as_deref() == Some("0xowner")));
}
