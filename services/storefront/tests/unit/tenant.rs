//! Tenant resolution tests

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;

use storefront::StorefrontError;
use storefront::tenant::{RuntimeMode, StaticTenantTable, TenantResolver, TenantSource};

use crate::common::*;

#[fixture]
fn production() -> TenantResolver {
    init_test_env();
    resolver(RuntimeMode::Production)
}

#[fixture]
fn development() -> TenantResolver {
    init_test_env();
    resolver(RuntimeMode::Development)
}

#[rstest]
#[case(HOST_A, None)]
#[case(HOST_A, Some(COLLECTION_A2))]
#[case(HOST_B, Some(COLLECTION_B))]
#[case(HOST_A, Some(COLLECTION_B))]
fn test_resolution_is_deterministic(
    production: TenantResolver,
    development: TenantResolver,
    #[case] host: &str,
    #[case] collection: Option<&str>,
) {
    for resolver in [&production, &development] {
        let first = resolver.resolve(host, collection).unwrap();
        let second = resolver.resolve(host, collection).unwrap();
        assert_eq!(first, second);
    }
}

#[rstest]
fn test_collection_layer_overrides_base(production: TenantResolver) {
    let organization = production.resolve(HOST_A, Some(COLLECTION_A2)).unwrap();
    assert_eq!(organization.contract_id, COLLECTION_A2);
    assert_eq!(organization.name, "Ape Kids");
    assert_eq!(organization.listing_icon, "/kid.svg");
    assert!((organization.royalty_fee - 0.075).abs() < f64::EPSILON);
    // untouched fields come from the base record
    assert_eq!(organization.service_fee_recipient, "0xDEF");
}

#[rstest]
fn test_collection_match_ignores_case(production: TenantResolver) {
    let upper = COLLECTION_A2.to_ascii_uppercase().replacen("0X", "0x", 1);
    let organization = production.resolve_collection(HOST_A, &upper).unwrap();
    assert_eq!(organization.contract_id, COLLECTION_A2);
}

#[rstest]
#[case(HOST_A, COLLECTION_B)]
#[case(HOST_B, COLLECTION_A)]
#[case(HOST_B, COLLECTION_A2)]
fn test_foreign_collection_is_not_found(
    production: TenantResolver,
    development: TenantResolver,
    #[case] host: &str,
    #[case] collection: &str,
) {
    for resolver in [&production, &development] {
        let organization = resolver.resolve(host, Some(collection)).unwrap();
        assert!(!organization.serves_collection(collection));

        let error = resolver.resolve_collection(host, collection).unwrap_err();
        assert!(error.is_not_found());
        assert!(matches!(error, StorefrontError::CollectionNotOwned { .. }));
    }
}

#[rstest]
fn test_development_layers(development: TenantResolver, production: TenantResolver) {
    let dev = development.resolve(HOST_A, None).unwrap();
    assert_eq!(dev.contract_id, DEV_COLLECTION_A);
    assert_eq!(dev.collections.len(), 1);
    assert!((dev.service_fee - 0.02).abs() < f64::EPSILON);
    assert!(dev.testnet_network);
    assert_eq!(dev.chain_id(), 5);

    let prod = production.resolve(HOST_A, None).unwrap();
    assert_eq!(prod.contract_id, COLLECTION_A);
    assert_eq!(prod.collections.len(), 2);
    assert!((prod.service_fee - 0.01).abs() < f64::EPSILON);
    assert_eq!(prod.chain_id(), 1);
}

#[rstest]
fn test_resolution_never_mutates_source(development: TenantResolver) {
    let table = tenant_table();
    let before = table.organization(HOST_A).unwrap();
    development.resolve(HOST_A, Some(DEV_COLLECTION_A)).unwrap();
    development.resolve(HOST_A, None).unwrap();
    assert_eq!(table.organization(HOST_A).unwrap(), before);
    assert_eq!(before, tenant_a());
}

#[rstest]
#[case("apes.shop.xyz")]
#[case("APES.Shop.XYZ")]
#[case("apes.shop.xyz.localhost:3000")]
#[case("  apes.shop.xyz ")]
fn test_hostname_normalization(production: TenantResolver, #[case] host: &str) {
    let organization = production.resolve(host, None).unwrap();
    assert_eq!(organization.name, "Ape Market");
}

#[test]
fn test_source_domain_follows_request_host() {
    let table = StaticTenantTable::from_organizations([("market.other.xyz", tenant_a())]);
    let resolver = TenantResolver::new(
        std::sync::Arc::new(table),
        RuntimeMode::Production,
        ".localhost:3000",
    );
    assert_eq!(resolver.source_domain("Market.Other.xyz.localhost:3000"), "market.other.xyz");
    let organization = resolver.resolve("market.other.xyz", None).unwrap();
    assert_eq!(organization.url, "https://apes.shop.xyz");
}

#[rstest]
fn test_unknown_host(production: TenantResolver) {
    let error = production.resolve("nobody.example", None).unwrap_err();
    assert!(matches!(
        error,
        StorefrontError::TenantNotFound { ref hostname } if hostname == "nobody.example"
    ));
    assert_eq!(error.status_code(), axum::http::StatusCode::NOT_FOUND);
}

#[rstest]
fn test_theme_is_carried_opaquely(production: TenantResolver) {
    let organization = production.resolve(HOST_A, Some(COLLECTION_A2)).unwrap();
    assert_eq!(
        organization.theme.values().get("primaryColor"),
        Some(&json!("#ff0000"))
    );
    let value = serde_json::to_value(&organization).unwrap();
    assert_eq!(value["primaryColor"], json!("#ff0000"));
}

#[test]
fn test_table_from_json_lowercases_hosts() {
    let raw = json!({ "Shop.Example.COM": serde_json::to_value(tenant_b()).unwrap() }).to_string();
    let table = StaticTenantTable::from_json(&raw).unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.organization("shop.example.com").is_some());
}

#[test]
fn test_table_rejects_malformed_json() {
    let error = StaticTenantTable::from_json("{\"host\": {\"name\": 1}}").unwrap_err();
    assert!(matches!(error, StorefrontError::Configuration { .. }));
}
