//! Marketplace action orchestration
//!
//! An [`ActionSurface`] drives one user-facing action (a modal or button)
//! through `Idle -> Created -> Submitted -> Completed -> Success`. Any protocol
//! failure returns it to `Idle` with a toast. Success triggers exactly one
//! cache refresh. Closing the surface retires the in-flight invocation: its
//! late result no longer moves the phase, fires the refresh or frees the
//! surface.

pub mod client;
pub mod expiration;
pub mod fees;
pub mod lifecycle;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::ActionsConfig;
use crate::error::StorefrontResult;
use crate::fetcher::CacheInvalidator;

pub use client::{
    ActionKind, ActionRequest, OrderProtocolClient, ProgressCallback, ProgressItem, ProgressStep,
    ProtocolError, Signer, USER_REJECTED_CODE,
};
pub use expiration::ExpirationPreset;
pub use fees::{FeeEntry, FeeSchedule};
pub use lifecycle::{ActionLifecycle, ActionPhase};

/// Wallet state supplied by the wallet-connection provider
#[derive(Clone, Default)]
pub struct WalletConnection {
    pub address: Option<String>,
    pub is_connected: bool,
    pub is_connecting: bool,
    pub signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for WalletConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnection")
            .field("address", &self.address)
            .field("is_connected", &self.is_connected)
            .field("is_connecting", &self.is_connecting)
            .field("has_signer", &self.signer.is_some())
            .finish()
    }
}

impl WalletConnection {
    /// A connected wallet with a signer
    pub fn connected(signer: Arc<dyn Signer>) -> Self {
        Self {
            address: Some(signer.address().to_string()),
            is_connected: true,
            is_connecting: false,
            signer: Some(signer),
        }
    }

    /// Signer, only when an address is also present
    fn ready_signer(&self) -> Option<&Arc<dyn Signer>> {
        self.address.as_ref().filter(|a| !a.is_empty())?;
        self.signer.as_ref()
    }
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Error,
}

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
}

impl Toast {
    /// Toast for a failed action
    #[must_use]
    pub fn for_failure(kind: ActionKind, failure: &ProtocolError) -> Self {
        if failure.is_user_rejection() {
            let (title, message) = match kind {
                ActionKind::List => ("User canceled listing", "You have canceled the listing."),
                ActionKind::PlaceBid => ("User canceled offer", "You have canceled the offer."),
                _ => ("User canceled transaction", "You have canceled the transaction."),
            };
            return Self {
                kind: ToastKind::Info,
                title: title.to_string(),
                message: message.to_string(),
            };
        }
        let title = match kind {
            ActionKind::List | ActionKind::PlaceBid => "Bad request error",
            ActionKind::Buy => "Could not buy token",
            ActionKind::CancelListing => "Could not cancel listing",
            ActionKind::CancelOffer => "Could not cancel offer",
            ActionKind::AcceptOffer => "Could not accept bid",
        };
        Self {
            kind: ToastKind::Error,
            title: title.to_string(),
            message: failure
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "The transaction was not completed.".to_string()),
        }
    }
}

/// Result of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Reached `Success`
    Succeeded,
    /// No wallet address or signer; connection was requested instead
    ConnectWalletRequested,
    /// Another invocation is still in flight on this surface
    Busy,
    /// User declined in the wallet
    Rejected(Toast),
    /// Any other failure
    Failed(Toast),
    /// The surface was closed while this invocation was in flight
    Closed,
}

/// Events broadcast by an action surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    Transition {
        from: ActionPhase,
        to: ActionPhase,
    },
    Toast(Toast),
    ConnectWalletRequested,
    Refreshed,
}

/// Read-side check that a submitted action is visible to the indexer
#[async_trait]
pub trait SettlementProbe: Send + Sync {
    async fn is_settled(&self, request: &ActionRequest) -> StorefrontResult<bool>;
}

/// Called once after an action reaches `Success`
pub trait RefreshHook: Send + Sync {
    fn refresh(&self, request: &ActionRequest);
}

/// Refresh hook that invalidates page-cache keys mentioning a collection
pub struct CollectionRefresh {
    caches: Vec<Arc<dyn CacheInvalidator>>,
    collection_id: String,
}

impl CollectionRefresh {
    pub fn new(caches: Vec<Arc<dyn CacheInvalidator>>, collection_id: impl Into<String>) -> Self {
        Self {
            caches,
            collection_id: collection_id.into().to_ascii_lowercase(),
        }
    }
}

impl RefreshHook for CollectionRefresh {
    fn refresh(&self, request: &ActionRequest) {
        let needle = self.collection_id.as_str();
        let invalidated: usize = self
            .caches
            .iter()
            .map(|cache| cache.invalidate_where(&|key| key.to_ascii_lowercase().contains(needle)))
            .sum();
        info!(
            action = %request.kind(),
            collection_id = %self.collection_id,
            invalidated,
            "Refreshed cached pages after action"
        );
    }
}

/// One action surface and its state machine
pub struct ActionSurface {
    kind: ActionKind,
    client: Arc<dyn OrderProtocolClient>,
    lifecycle: ActionLifecycle,
    phase: Mutex<ActionPhase>,
    waiting: AtomicBool,
    generation: AtomicU64,
    events: broadcast::Sender<ActionEvent>,
    refresh: Option<Arc<dyn RefreshHook>>,
    probe: Option<Arc<dyn SettlementProbe>>,
    timing: ActionsConfig,
}

impl std::fmt::Debug for ActionSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSurface")
            .field("kind", &self.kind)
            .field("phase", &*self.phase.lock())
            .field("waiting", &self.waiting.load(Ordering::Acquire))
            .field("generation", &self.generation.load(Ordering::Acquire))
            .finish()
    }
}

impl ActionSurface {
    pub fn new(kind: ActionKind, client: Arc<dyn OrderProtocolClient>, timing: ActionsConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            kind,
            client,
            lifecycle: ActionLifecycle::new(),
            phase: Mutex::new(ActionPhase::Idle),
            waiting: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            events,
            refresh: None,
            probe: None,
            timing,
        }
    }

    /// Invalidate caches through `hook` after success
    #[must_use]
    pub fn with_refresh(mut self, hook: Arc<dyn RefreshHook>) -> Self {
        self.refresh = Some(hook);
        self
    }

    /// Poll `probe` after submission instead of waiting a fixed delay
    #[must_use]
    pub fn with_settlement_probe(mut self, probe: Arc<dyn SettlementProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.kind
    }

    #[must_use]
    pub fn phase(&self) -> ActionPhase {
        *self.phase.lock()
    }

    /// Whether an invocation is in flight
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ActionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Move to `next` unconditionally
    fn transition(&self, next: ActionPhase) -> bool {
        self.transition_guarded(None, next)
    }

    /// Move to `next` only while `generation` still owns the surface
    fn advance(&self, generation: u64, next: ActionPhase) -> bool {
        self.transition_guarded(Some(generation), next)
    }

    fn transition_guarded(&self, generation: Option<u64>, next: ActionPhase) -> bool {
        let from = {
            let mut phase = self.phase.lock();
            if generation.is_some_and(|g| !self.is_current(g)) {
                debug!(action = %self.kind, to = %next, "Dropped transition from a retired invocation");
                return false;
            }
            let from = *phase;
            if let Err(e) = self.lifecycle.validate_transition(from, next) {
                error!(action = %self.kind, error = %e, "Rejected action transition");
                return false;
            }
            *phase = next;
            from
        };
        info!(action = %self.kind, from = %from, to = %next, "Action transition");
        self.emit(ActionEvent::Transition { from, to: next });
        true
    }

    /// Free the surface if `generation` still owns it
    fn release(&self, generation: u64) -> bool {
        let _phase = self.phase.lock();
        if !self.is_current(generation) {
            return false;
        }
        self.waiting.store(false, Ordering::Release);
        true
    }

    /// Return to `Idle` and free the surface, unless `generation` was retired
    fn reset(&self, generation: u64) {
        if self.phase() != ActionPhase::Idle {
            self.advance(generation, ActionPhase::Idle);
        }
        self.release(generation);
    }

    /// Close the surface, discarding any state
    ///
    /// An invocation still in flight is retired: whatever it returns later
    /// is dropped.
    pub fn close(&self) {
        debug!(action = %self.kind, "Closing action surface");
        {
            let _phase = self.phase.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        if self.phase() != ActionPhase::Idle {
            self.transition(ActionPhase::Idle);
        }
        self.waiting.store(false, Ordering::Release);
    }

    fn on_progress(&self, generation: u64, steps: &[ProgressStep]) {
        let submitted = steps.last().is_some_and(ProgressStep::first_item_complete);
        if submitted && self.phase() == ActionPhase::Created {
            self.advance(generation, ActionPhase::Submitted);
        }
    }

    fn retired(&self, generation: u64) -> ActionOutcome {
        debug!(action = %self.kind, generation, "Dropped result of a closed action");
        ActionOutcome::Closed
    }

    /// Run `request` through the order-protocol client
    pub async fn execute(&self, wallet: &WalletConnection, request: ActionRequest) -> ActionOutcome {
        let Some(signer) = wallet.ready_signer().cloned() else {
            warn!(action = %self.kind, "Wallet not ready; requesting connection");
            self.emit(ActionEvent::ConnectWalletRequested);
            return ActionOutcome::ConnectWalletRequested;
        };

        if self.waiting.swap(true, Ordering::AcqRel) {
            debug!(action = %self.kind, "Action already in flight");
            return ActionOutcome::Busy;
        }

        let generation = {
            let _phase = self.phase.lock();
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        if self.phase() != ActionPhase::Idle {
            self.advance(generation, ActionPhase::Idle);
        }
        self.advance(generation, ActionPhase::Created);

        let progress = |steps: &[ProgressStep]| self.on_progress(generation, steps);
        let result = self.client.submit(&request, signer.as_ref(), &progress).await;

        match result {
            Ok(()) => {
                if self.phase() == ActionPhase::Created {
                    self.advance(generation, ActionPhase::Submitted);
                }
                self.await_settlement(&request).await;
                self.advance(generation, ActionPhase::Completed);
                sleep_ms(self.timing.completed_to_success_ms).await;
                if !self.advance(generation, ActionPhase::Success) {
                    return self.retired(generation);
                }
                if let Some(hook) = &self.refresh {
                    hook.refresh(&request);
                    self.emit(ActionEvent::Refreshed);
                }
                self.release(generation);
                ActionOutcome::Succeeded
            }
            Err(_) if !self.is_current(generation) => self.retired(generation),
            Err(failure) => {
                let toast = Toast::for_failure(self.kind, &failure);
                if failure.is_user_rejection() {
                    info!(action = %self.kind, "User rejected action in wallet");
                } else {
                    warn!(action = %self.kind, error = %failure, "Action failed");
                }
                self.emit(ActionEvent::Toast(toast.clone()));
                self.reset(generation);
                if failure.is_user_rejection() {
                    ActionOutcome::Rejected(toast)
                } else {
                    ActionOutcome::Failed(toast)
                }
            }
        }
    }

    /// Wait for the indexer: bounded backoff poll, or the fixed delay
    async fn await_settlement(&self, request: &ActionRequest) {
        let Some(probe) = &self.probe else {
            sleep_ms(self.timing.submitted_to_completed_ms).await;
            return;
        };

        let mut backoff = self.timing.settlement_initial_backoff_ms;
        for attempt in 1..=self.timing.settlement_poll_attempts {
            sleep_ms(backoff).await;
            match probe.is_settled(request).await {
                Ok(true) => {
                    debug!(action = %self.kind, attempt, "Settlement observed");
                    return;
                }
                Ok(false) => debug!(action = %self.kind, attempt, "Not settled yet"),
                Err(e) => warn!(action = %self.kind, attempt, error = %e, "Settlement probe failed"),
            }
            backoff = backoff.saturating_mul(2);
        }
        warn!(
            action = %self.kind,
            attempts = self.timing.settlement_poll_attempts,
            "Settlement not observed; continuing"
        );
    }
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
