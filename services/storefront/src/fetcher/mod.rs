//! Cursor-paginated incremental fetching
//!
//! An [`InfiniteQuery`] owns the parameters of one paginated view (a
//! [`KeyLoader`]) and reads and writes pages through a shared [`PageCache`]
//! keyed by the loader's page-0 URL. Pages are fetched strictly in order, one
//! request per key at a time, and only when the caller signals that more items
//! are needed (`load_more`). Changing any parameter yields a new key and a new,
//! empty sequence; responses for a key that is no longer active, or for a
//! sequence that was invalidated meanwhile, are dropped.

pub mod cache;
pub mod keys;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{StorefrontError, StorefrontResult};

pub use cache::{CacheInvalidator, PageCache, SequenceSnapshot};
pub use keys::{BidsKey, CollectionSort, CollectionSummary, CollectionsKey, SalesKey, TokensKey, UserTokensKey};

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` ends the sequence
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, continuation: Option<String>) -> Self {
        Self {
            items,
            continuation,
        }
    }

    /// Whether no page may follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.items.is_empty() || self.continuation.is_none()
    }
}

/// Anything that can GET a JSON document by URL
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_json(&self, url: &Url) -> StorefrontResult<Value>;
}

/// Builds page URLs and decodes page bodies for one endpoint family
pub trait KeyLoader: Send + Sync {
    /// Normalized item type
    type Item: Clone + Send + Sync + 'static;

    /// Endpoint family, for logs and decode errors
    fn endpoint(&self) -> &'static str;

    /// URL of page `index`, or `None` when the sequence has ended
    fn page_url(&self, index: usize, previous: Option<&Page<Self::Item>>) -> Option<Url>;

    /// Decode a response body into a page
    fn decode(&self, body: Value) -> StorefrontResult<Page<Self::Item>>;

    /// Identity of the whole sequence: the first page's URL
    fn cache_key(&self) -> Option<String> {
        self.page_url(0, None).map(String::from)
    }
}

/// Append `path` to the base URL's own path
#[must_use]
pub fn endpoint_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(None);
    url
}

/// Fetch page 0 outside any cache
///
/// Used to render the first page server-side; the result is later handed to
/// [`InfiniteQuery::with_fallback`] under the loader's cache key.
pub async fn fetch_first_page<L: KeyLoader>(
    source: &dyn PageSource,
    loader: &L,
) -> StorefrontResult<Page<L::Item>> {
    let Some(url) = loader.page_url(0, None) else {
        return Ok(Page::new(Vec::new(), None));
    };
    debug!(endpoint = loader.endpoint(), url = %url, "Fetching first page");
    let body = source.fetch_json(&url).await?;
    loader.decode(body)
}

pub(crate) fn decode_body<T: DeserializeOwned>(endpoint: &str, body: Value) -> StorefrontResult<T> {
    serde_json::from_value(body).map_err(|e| StorefrontError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Result of a visibility signal
#[derive(Debug)]
pub enum LoadOutcome {
    /// A page was appended
    Loaded {
        index: usize,
        items: usize,
    },
    /// A fetch for this key is already outstanding
    Busy,
    /// The sequence has ended, or there is no active key
    Exhausted,
    /// The response arrived for an abandoned key or invalidated sequence
    Stale,
    /// The fetch failed; the page stays unfetched
    Failed(StorefrontError),
}

/// Infinite, parameterized view over a paginated endpoint
pub struct InfiniteQuery<L: KeyLoader> {
    source: Arc<dyn PageSource>,
    cache: Arc<PageCache<L::Item>>,
    loader: RwLock<Arc<L>>,
}

impl<L: KeyLoader> std::fmt::Debug for InfiniteQuery<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loader = self.loader();
        f.debug_struct("InfiniteQuery")
            .field("endpoint", &loader.endpoint())
            .field("key", &loader.cache_key())
            .finish()
    }
}

impl<L: KeyLoader> InfiniteQuery<L> {
    pub fn new(source: Arc<dyn PageSource>, cache: Arc<PageCache<L::Item>>, loader: L) -> Self {
        Self {
            source,
            cache,
            loader: RwLock::new(Arc::new(loader)),
        }
    }

    /// Seed page 0 with server-rendered data
    ///
    /// Only applies when `fallback_key` equals the current key; a fallback
    /// rendered for other parameters is ignored.
    #[must_use]
    pub fn with_fallback(self, fallback_key: &str, page: Page<L::Item>) -> Self {
        match self.active_key() {
            Some(key) if key == fallback_key => {
                self.cache.seed(&key, page);
            }
            _ => debug!(fallback_key = %fallback_key, "Fallback key does not match; ignoring"),
        }
        self
    }

    /// Key of the current parameters
    #[must_use]
    pub fn active_key(&self) -> Option<String> {
        self.loader.read().cache_key()
    }

    /// Current loader
    #[must_use]
    pub fn loader(&self) -> Arc<L> {
        Arc::clone(&*self.loader.read())
    }

    /// Replace the parameters; returns whether the key changed
    ///
    /// The old key's pages are left behind untouched.
    pub fn set_loader(&self, loader: L) -> bool {
        let previous = self.active_key();
        let next = loader.cache_key();
        *self.loader.write() = Arc::new(loader);
        let changed = previous != next;
        if changed {
            debug!(from = ?previous, to = ?next, "Query key changed");
        }
        changed
    }

    /// Pages fetched so far for the current key
    #[must_use]
    pub fn snapshot(&self) -> SequenceSnapshot<L::Item> {
        self.active_key()
            .map(|key| self.cache.snapshot(&key))
            .unwrap_or_default()
    }

    /// All items fetched so far, in page order
    #[must_use]
    pub fn items(&self) -> Vec<L::Item> {
        self.snapshot()
            .pages
            .into_iter()
            .flat_map(|page| page.items)
            .collect()
    }

    /// Handle a visibility signal: fetch the next page if allowed
    pub async fn load_more(&self) -> LoadOutcome {
        let loader = self.loader();
        let Some(key) = loader.cache_key() else {
            return LoadOutcome::Exhausted;
        };

        let Some(ticket) = self.cache.begin(&key, |pages| {
            let previous = pages.last();
            if previous.is_some_and(Page::is_terminal) {
                return None;
            }
            loader.page_url(pages.len(), previous)
        }) else {
            let snapshot = self.cache.snapshot(&key);
            return if snapshot.in_flight {
                LoadOutcome::Busy
            } else {
                LoadOutcome::Exhausted
            };
        };

        debug!(endpoint = loader.endpoint(), index = ticket.index, url = %ticket.url, "Fetching page");
        let result = match self.source.fetch_json(&ticket.url).await {
            Ok(body) => loader.decode(body),
            Err(error) => Err(error),
        };

        if self.active_key().as_deref() != Some(key.as_str()) {
            self.cache.abandon(&key, &ticket);
            debug!(key = %key, "Dropping response for abandoned key");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(page) => {
                let items = page.items.len();
                if self.cache.complete(&key, &ticket, page) {
                    LoadOutcome::Loaded {
                        index: ticket.index,
                        items,
                    }
                } else {
                    LoadOutcome::Stale
                }
            }
            Err(error) => {
                warn!(endpoint = loader.endpoint(), index = ticket.index, error = %error, "Page fetch failed");
                if self.cache.fail(&key, &ticket, error.to_string()) {
                    LoadOutcome::Failed(error)
                } else {
                    LoadOutcome::Stale
                }
            }
        }
    }

    /// Drop the current key's pages so they are fetched again
    pub fn revalidate(&self) {
        if let Some(key) = self.active_key() {
            info!(key = %key, "Revalidating query");
            self.cache.invalidate(&key);
        }
    }
}
