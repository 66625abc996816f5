//! Action lifecycle, toast and fee tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, broadcast};

use storefront::actions::{
    ActionEvent, ActionKind, ActionOutcome, ActionPhase, ActionRequest, ActionSurface,
    CollectionRefresh, ExpirationPreset, FeeSchedule, OrderProtocolClient, ProgressCallback,
    ProtocolError, RefreshHook, SettlementProbe, Signer, ToastKind, WalletConnection,
};
use storefront::config::ActionsConfig;
use storefront::currency::{CurrencySymbol, find_by_symbol, native_currency};
use storefront::error::StorefrontResult;
use storefront::fetcher::{CacheInvalidator, KeyLoader, Page, PageCache, TokensKey};
use storefront::token::Token;

use crate::common::*;

fn wallet() -> WalletConnection {
    WalletConnection::connected(Arc::new(TestSigner("0xbuyer".to_string())))
}

fn request_for(kind: ActionKind) -> ActionRequest {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let token = listed_token(COLLECTION_B, "7", Some("1000000000000000000"));
    match kind {
        ActionKind::List => ActionRequest::listing(
            &tenant_b(),
            &token,
            "1.0",
            native_currency(),
            ExpirationPreset::OneWeek,
            now,
        ),
        ActionKind::PlaceBid => {
            ActionRequest::bid(&tenant_b(), &token, "0.5", ExpirationPreset::OneHour, now)
        }
        ActionKind::Buy => ActionRequest::buy(&token),
        ActionKind::CancelListing => ActionRequest::cancel_listing(&token),
        ActionKind::CancelOffer => ActionRequest::cancel_offer("order-1"),
        ActionKind::AcceptOffer => ActionRequest::accept_offer(&token, "order-1", Some(0.5)),
    }
    .unwrap()
}

fn surface(kind: ActionKind, script: Script) -> (ActionSurface, Arc<ScriptedClient>) {
    let client = Arc::new(ScriptedClient::new(script));
    let surface = ActionSurface::new(
        kind,
        Arc::clone(&client) as Arc<dyn OrderProtocolClient>,
        ActionsConfig::immediate(),
    );
    (surface, client)
}

fn drain(events: &mut broadcast::Receiver<ActionEvent>) -> Vec<ActionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn transitions(events: &[ActionEvent]) -> Vec<(ActionPhase, ActionPhase)> {
    events
        .iter()
        .filter_map(|event| match event {
            ActionEvent::Transition { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

const HAPPY_PATH: [(ActionPhase, ActionPhase); 4] = [
    (ActionPhase::Idle, ActionPhase::Created),
    (ActionPhase::Created, ActionPhase::Submitted),
    (ActionPhase::Submitted, ActionPhase::Completed),
    (ActionPhase::Completed, ActionPhase::Success),
];

#[rstest]
#[case(ActionKind::List)]
#[case(ActionKind::Buy)]
#[case(ActionKind::PlaceBid)]
#[case(ActionKind::CancelListing)]
#[case(ActionKind::CancelOffer)]
#[case(ActionKind::AcceptOffer)]
#[tokio::test]
async fn test_success_walks_every_phase(#[case] kind: ActionKind) {
    init_test_env();
    let refresh = Arc::new(RecordingRefresh::default());
    let (surface, client) = surface(kind, Script::Succeed);
    let surface = surface.with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshHook>);
    let mut events = surface.subscribe();

    let outcome = surface.execute(&wallet(), request_for(kind)).await;
    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(surface.phase(), ActionPhase::Success);
    assert!(!surface.is_waiting());
    assert_eq!(client.submissions.lock().len(), 1);
    assert_eq!(client.submissions.lock()[0].kind(), kind);

    let seen = drain(&mut events);
    assert_eq!(transitions(&seen), HAPPY_PATH.to_vec());
    assert_eq!(refresh.calls(), 1);
    // refresh fires only once the surface has reached success
    assert_eq!(seen.last(), Some(&ActionEvent::Refreshed));
    assert!(seen.iter().all(|event| !matches!(event, ActionEvent::Toast(_))));
}

#[tokio::test]
async fn test_silent_client_still_passes_submitted() {
    let (surface, _client) = surface(ActionKind::Buy, Script::SucceedSilently);
    let mut events = surface.subscribe();
    let outcome = surface.execute(&wallet(), request_for(ActionKind::Buy)).await;
    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(transitions(&drain(&mut events)), HAPPY_PATH.to_vec());
}

#[tokio::test]
async fn test_success_without_refresh_hook() {
    let (surface, _client) = surface(ActionKind::CancelOffer, Script::Succeed);
    let mut events = surface.subscribe();
    surface.execute(&wallet(), request_for(ActionKind::CancelOffer)).await;
    assert!(!drain(&mut events).contains(&ActionEvent::Refreshed));
}

#[rstest]
#[case(ActionKind::List, "User canceled listing", "You have canceled the listing.")]
#[case(ActionKind::PlaceBid, "User canceled offer", "You have canceled the offer.")]
#[case(ActionKind::Buy, "User canceled transaction", "You have canceled the transaction.")]
#[case(ActionKind::AcceptOffer, "User canceled transaction", "You have canceled the transaction.")]
#[tokio::test]
async fn test_user_rejection_shows_info_toast(
    #[case] kind: ActionKind,
    #[case] title: &str,
    #[case] message: &str,
) {
    init_test_env();
    let refresh = Arc::new(RecordingRefresh::default());
    let (surface, _client) = surface(kind, Script::FailAfterCreated(ProtocolError::user_rejected()));
    let surface = surface.with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshHook>);
    let mut events = surface.subscribe();

    let outcome = surface.execute(&wallet(), request_for(kind)).await;
    let ActionOutcome::Rejected(toast) = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(toast.kind, ToastKind::Info);
    assert_eq!(toast.title, title);
    assert_eq!(toast.message, message);

    let seen = drain(&mut events);
    let toasts: Vec<_> = seen
        .iter()
        .filter(|event| matches!(event, ActionEvent::Toast(_)))
        .collect();
    assert_eq!(toasts.len(), 1);
    assert_eq!(
        transitions(&seen),
        vec![
            (ActionPhase::Idle, ActionPhase::Created),
            (ActionPhase::Created, ActionPhase::Idle),
        ]
    );
    assert_eq!(surface.phase(), ActionPhase::Idle);
    assert!(!surface.is_waiting());
    assert_eq!(refresh.calls(), 0);
}

#[rstest]
#[case(ActionKind::Buy, "Could not buy token")]
#[case(ActionKind::CancelListing, "Could not cancel listing")]
#[case(ActionKind::CancelOffer, "Could not cancel offer")]
#[case(ActionKind::AcceptOffer, "Could not accept bid")]
#[case(ActionKind::List, "Bad request error")]
#[case(ActionKind::PlaceBid, "Bad request error")]
#[tokio::test]
async fn test_failure_shows_error_toast(#[case] kind: ActionKind, #[case] title: &str) {
    let error = ProtocolError::new(Some(-32000), "insufficient funds");
    let (surface, _client) = surface(kind, Script::FailImmediately(error));
    let outcome = surface.execute(&wallet(), request_for(kind)).await;
    let ActionOutcome::Failed(toast) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.title, title);
    assert_eq!(toast.message, "insufficient funds");
    assert_eq!(surface.phase(), ActionPhase::Idle);
}

#[tokio::test]
async fn test_failure_without_message_uses_default() {
    let (surface, _client) = surface(ActionKind::Buy, Script::FailImmediately(ProtocolError::default()));
    let outcome = surface.execute(&wallet(), request_for(ActionKind::Buy)).await;
    let ActionOutcome::Failed(toast) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(toast.message, "The transaction was not completed.");
}

#[rstest]
#[case(WalletConnection::default())]
#[case(WalletConnection { address: Some("0xbuyer".into()), is_connected: true, ..Default::default() })]
#[case(WalletConnection { signer: Some(Arc::new(TestSigner("0xbuyer".into())) as Arc<dyn Signer>), ..Default::default() })]
#[tokio::test]
async fn test_missing_wallet_requests_connection(#[case] wallet: WalletConnection) {
    let (surface, client) = surface(ActionKind::Buy, Script::Succeed);
    let mut events = surface.subscribe();
    let outcome = surface.execute(&wallet, request_for(ActionKind::Buy)).await;
    assert_eq!(outcome, ActionOutcome::ConnectWalletRequested);
    assert_eq!(drain(&mut events), vec![ActionEvent::ConnectWalletRequested]);
    assert_eq!(surface.phase(), ActionPhase::Idle);
    assert!(client.submissions.lock().is_empty());
}

#[tokio::test]
async fn test_retry_after_rejection_succeeds() {
    let client = Arc::new(FlakyClient::default());
    let surface = ActionSurface::new(
        ActionKind::List,
        Arc::clone(&client) as Arc<dyn OrderProtocolClient>,
        ActionsConfig::immediate(),
    );
    assert!(matches!(
        surface.execute(&wallet(), request_for(ActionKind::List)).await,
        ActionOutcome::Rejected(_)
    ));
    assert_eq!(
        surface.execute(&wallet(), request_for(ActionKind::List)).await,
        ActionOutcome::Succeeded
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_invocation_while_waiting_is_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(GatedClient {
        gate: Arc::clone(&gate),
    });
    let surface = Arc::new(ActionSurface::new(
        ActionKind::Buy,
        client as Arc<dyn OrderProtocolClient>,
        ActionsConfig::immediate(),
    ));

    let first = tokio::spawn({
        let surface = Arc::clone(&surface);
        async move { surface.execute(&wallet(), request_for(ActionKind::Buy)).await }
    });
    while !surface.is_waiting() {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        surface.execute(&wallet(), request_for(ActionKind::Buy)).await,
        ActionOutcome::Busy
    );

    gate.add_permits(1);
    assert_eq!(first.await.unwrap(), ActionOutcome::Succeeded);
}

#[tokio::test]
async fn test_closed_invocation_cannot_touch_its_successor() {
    init_test_env();
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(GatedClient {
        gate: Arc::clone(&gate),
    });
    let refresh = Arc::new(RecordingRefresh::default());
    let surface = Arc::new(
        ActionSurface::new(
            ActionKind::Buy,
            client as Arc<dyn OrderProtocolClient>,
            ActionsConfig::immediate(),
        )
        .with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshHook>),
    );
    let spawn_execute = |surface: &Arc<ActionSurface>| {
        let surface = Arc::clone(surface);
        tokio::spawn(async move { surface.execute(&wallet(), request_for(ActionKind::Buy)).await })
    };

    let first = spawn_execute(&surface);
    while !surface.is_waiting() {
        tokio::task::yield_now().await;
    }
    surface.close();
    assert_eq!(surface.phase(), ActionPhase::Idle);
    assert!(!surface.is_waiting());

    let second = spawn_execute(&surface);
    while !(surface.is_waiting() && surface.phase() == ActionPhase::Created) {
        tokio::task::yield_now().await;
    }

    // the semaphore is fair, so the first submit resolves first
    gate.add_permits(1);
    assert_eq!(first.await.unwrap(), ActionOutcome::Closed);
    assert_eq!(surface.phase(), ActionPhase::Created);
    assert!(surface.is_waiting());
    assert_eq!(refresh.calls(), 0);
    assert_eq!(
        surface.execute(&wallet(), request_for(ActionKind::Buy)).await,
        ActionOutcome::Busy
    );

    gate.add_permits(1);
    assert_eq!(second.await.unwrap(), ActionOutcome::Succeeded);
    assert_eq!(surface.phase(), ActionPhase::Success);
    assert!(!surface.is_waiting());
    assert_eq!(refresh.calls(), 1);
}

#[tokio::test]
async fn test_closed_invocation_failure_is_silent() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(GatedClient {
        gate: Arc::clone(&gate),
    });
    let surface = Arc::new(ActionSurface::new(
        ActionKind::List,
        client as Arc<dyn OrderProtocolClient>,
        ActionsConfig::immediate(),
    ));
    let mut events = surface.subscribe();

    let first = tokio::spawn({
        let surface = Arc::clone(&surface);
        async move {
            surface
                .execute(&wallet(), request_for(ActionKind::List))
                .await
        }
    });
    while !surface.is_waiting() {
        tokio::task::yield_now().await;
    }
    surface.close();
    // a closed permit makes the pending submit fail
    gate.close();

    assert_eq!(first.await.unwrap(), ActionOutcome::Closed);
    let seen = drain(&mut events);
    assert!(seen.iter().all(|event| !matches!(event, ActionEvent::Toast(_))));
    assert_eq!(
        transitions(&seen),
        vec![
            (ActionPhase::Idle, ActionPhase::Created),
            (ActionPhase::Created, ActionPhase::Idle),
        ]
    );
    assert_eq!(surface.phase(), ActionPhase::Idle);
}

#[tokio::test]
async fn test_rejection_after_submitted_returns_to_idle() {
    let refresh = Arc::new(RecordingRefresh::default());
    let (surface, _client) = surface(
        ActionKind::Buy,
        Script::FailAfterSubmitted(ProtocolError::user_rejected()),
    );
    let surface = surface.with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshHook>);
    let mut events = surface.subscribe();

    let outcome = surface.execute(&wallet(), request_for(ActionKind::Buy)).await;
    let ActionOutcome::Rejected(toast) = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(toast.kind, ToastKind::Info);
    assert_eq!(toast.title, "User canceled transaction");

    let seen = drain(&mut events);
    assert_eq!(
        transitions(&seen),
        vec![
            (ActionPhase::Idle, ActionPhase::Created),
            (ActionPhase::Created, ActionPhase::Submitted),
            (ActionPhase::Submitted, ActionPhase::Idle),
        ]
    );
    assert_eq!(
        seen.iter()
            .filter(|event| matches!(event, ActionEvent::Toast(_)))
            .count(),
        1
    );
    assert_eq!(surface.phase(), ActionPhase::Idle);
    assert!(!surface.is_waiting());
    assert_eq!(refresh.calls(), 0);
}

#[tokio::test]
async fn test_settlement_probe_is_polled_until_settled() {
    let probe = Arc::new(CountingProbe::settles_after(2));
    let (surface, _client) = surface(ActionKind::List, Script::Succeed);
    let surface = surface.with_settlement_probe(Arc::clone(&probe) as Arc<dyn SettlementProbe>);
    let outcome = surface.execute(&wallet(), request_for(ActionKind::List)).await;
    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsettled_action_still_completes_after_polling() {
    let probe = Arc::new(CountingProbe::settles_after(usize::MAX));
    let (surface, _client) = surface(ActionKind::List, Script::Succeed);
    let surface = surface.with_settlement_probe(Arc::clone(&probe) as Arc<dyn SettlementProbe>);
    let outcome = surface.execute(&wallet(), request_for(ActionKind::List)).await;
    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_collection_refresh_invalidates_matching_pages() {
    let cache: Arc<PageCache<Token>> = Arc::new(PageCache::new());
    let base = url::Url::parse("https://read.example").unwrap();
    let key = TokensKey::new(base.clone(), COLLECTION_B, 20).cache_key().unwrap();
    let other = TokensKey::new(base, COLLECTION_A, 20).cache_key().unwrap();
    cache.seed(&key, Page::new(vec![listed_token(COLLECTION_B, "7", None)], None));
    cache.seed(&other, Page::new(Vec::new(), None));

    let hook = CollectionRefresh::new(
        vec![Arc::clone(&cache) as Arc<dyn CacheInvalidator>],
        COLLECTION_B.to_uppercase(),
    );
    let (surface, _client) = surface(ActionKind::Buy, Script::Succeed);
    let surface = surface.with_refresh(Arc::new(hook));
    surface.execute(&wallet(), request_for(ActionKind::Buy)).await;

    assert!(cache.snapshot(&key).pages.is_empty());
    assert_eq!(cache.snapshot(&key).epoch, 1);
    assert_eq!(cache.snapshot(&other).pages.len(), 1);
}

#[test]
fn test_listing_fees_with_automated_royalties() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let token = listed_token(COLLECTION_A, "1", None);
    let request = ActionRequest::listing(
        &tenant_a(),
        &token,
        "1.0",
        native_currency(),
        ExpirationPreset::OneHour,
        now,
    )
    .unwrap();
    let ActionRequest::List(listing) = request else {
        panic!("expected a listing");
    };
    assert!(listing.automated_royalties);
    assert_eq!(listing.fees, vec!["0xDEF:100"]);
    assert_eq!(listing.wei_price, "1000000000000000000");
    assert_eq!(listing.token, format!("{COLLECTION_A}:1"));
    assert_eq!(listing.expiration_time, now.timestamp() + 3600);
}

#[test]
fn test_listing_fees_with_explicit_royalty() {
    let schedule = FeeSchedule::for_currency(&tenant_b(), CurrencySymbol::Eth);
    assert!(!schedule.automated_royalties());
    assert_eq!(schedule.fee_strings(), vec!["0xDEF:100", "0xABC:500"]);
}

#[test]
fn test_listing_request_carries_explicit_royalty() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let request = ActionRequest::listing(
        &tenant_b(),
        &listed_token(COLLECTION_B, "7", None),
        "1.0",
        native_currency(),
        ExpirationPreset::OneWeek,
        now,
    )
    .unwrap();
    let ActionRequest::List(listing) = request else {
        panic!("expected a listing");
    };
    assert!(!listing.automated_royalties);
    assert_eq!(listing.fees, vec!["0xDEF:100", "0xABC:500"]);
    assert_eq!(listing.wei_price, "1000000000000000000");
    assert_eq!(listing.currency, native_currency().contract);
    assert_eq!(listing.expiration_time, now.timestamp() + 7 * 24 * 3600);
}

#[test]
fn test_currency_override_zero_service_fee() {
    let schedule = FeeSchedule::for_currency(&tenant_b(), CurrencySymbol::Ape);
    assert_eq!(schedule.fee_strings(), vec!["0xAPE:0", "0xABC:500"]);

    let ape = find_by_symbol(CurrencySymbol::Ape).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let request = ActionRequest::listing(
        &tenant_b(),
        &listed_token(COLLECTION_B, "7", None),
        "25",
        ape,
        ExpirationPreset::OneWeek,
        now,
    )
    .unwrap();
    let ActionRequest::List(listing) = request else {
        panic!("expected a listing");
    };
    assert_eq!(listing.currency, ape.contract);
    assert_eq!(listing.fees, vec!["0xAPE:0", "0xABC:500"]);
}

#[test]
fn test_displayed_fee() {
    let schedule = FeeSchedule::for_currency(&tenant_a(), CurrencySymbol::Eth);
    assert!((schedule.displayed_fee(false) - 0.05).abs() < 1e-12);
    assert!((schedule.displayed_fee(true) - 0.06).abs() < 1e-12);
}

#[test]
fn test_zero_price_is_rejected() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let token = listed_token(COLLECTION_A, "1", None);
    assert!(
        ActionRequest::listing(&tenant_a(), &token, "0", native_currency(), ExpirationPreset::OneHour, now)
            .is_err()
    );
    assert!(ActionRequest::bid(&tenant_a(), &token, "0.0", ExpirationPreset::OneHour, now).is_err());
}

#[test]
fn test_bid_uses_wrapped_currency() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let token = listed_token(COLLECTION_A, "1", None);
    let ActionRequest::PlaceBid(bid) =
        ActionRequest::bid(&tenant_a(), &token, "0.25", ExpirationPreset::OneWeek, now).unwrap()
    else {
        panic!("expected a bid");
    };
    assert_eq!(bid.currency, "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    assert_eq!(bid.wei_price, "250000000000000000");
    assert_eq!(bid.expiration_time, now.timestamp() + 7 * 24 * 3600);
}

#[test]
fn test_unlisted_token_cannot_be_bought() {
    let token = listed_token(COLLECTION_A, "1", None);
    assert!(ActionRequest::buy(&token).is_err());
    assert!(ActionRequest::cancel_listing(&token).is_err());
    assert!(ActionRequest::cancel_offer("").is_err());
}

/// Rejects the first call, succeeds afterwards
#[derive(Default)]
struct FlakyClient {
    calls: AtomicUsize,
}

#[async_trait]
impl OrderProtocolClient for FlakyClient {
    async fn submit(
        &self,
        _request: &ActionRequest,
        _signer: &dyn Signer,
        _on_progress: ProgressCallback<'_>,
    ) -> Result<(), ProtocolError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ProtocolError::user_rejected())
        } else {
            Ok(())
        }
    }
}

/// Resolves once a permit is released
struct GatedClient {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl OrderProtocolClient for GatedClient {
    async fn submit(
        &self,
        _request: &ActionRequest,
        _signer: &dyn Signer,
        _on_progress: ProgressCallback<'_>,
    ) -> Result<(), ProtocolError> {
        match self.gate.acquire().await {
            Ok(permit) => {
                permit.forget();
                Ok(())
            }
            Err(_) => Err(ProtocolError::new(None, "gate closed")),
        }
    }
}

struct CountingProbe {
    settles_after: usize,
    calls: AtomicUsize,
}

impl CountingProbe {
    fn settles_after(settles_after: usize) -> Self {
        Self {
            settles_after,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SettlementProbe for CountingProbe {
    async fn is_settled(&self, _request: &ActionRequest) -> StorefrontResult<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(call >= self.settles_after)
    }
}
