//! Shared page cache keyed by query key

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::Page;

/// Permission to fetch one page, issued by [`PageCache::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Page index being fetched
    pub index: usize,
    /// Sequence epoch at issue time
    pub epoch: u64,
    pub url: Url,
}

struct PageSequence<T> {
    pages: Vec<Page<T>>,
    epoch: u64,
    in_flight: bool,
    error: Option<String>,
}

impl<T> Default for PageSequence<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            epoch: 0,
            in_flight: false,
            error: None,
        }
    }
}

impl<T> PageSequence<T> {
    /// A ticket is current while no invalidation happened and no page was added
    const fn accepts(&self, ticket: &Ticket) -> bool {
        self.epoch == ticket.epoch && self.pages.len() == ticket.index
    }
}

/// Read-only copy of one key's sequence
#[derive(Debug, Clone)]
pub struct SequenceSnapshot<T> {
    pub pages: Vec<Page<T>>,
    pub epoch: u64,
    /// A request for the next page is outstanding
    pub in_flight: bool,
    /// Message of the last failed page fetch
    pub error: Option<String>,
}

impl<T> Default for SequenceSnapshot<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            epoch: 0,
            in_flight: false,
            error: None,
        }
    }
}

impl<T> SequenceSnapshot<T> {
    /// The last fetched page ended the sequence
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pages.last().is_some_and(Page::is_terminal)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }
}

/// Cache invalidation seen from outside the fetcher
pub trait CacheInvalidator: Send + Sync {
    /// Invalidate one key
    fn invalidate(&self, key: &str);

    /// Invalidate every key the predicate accepts; returns how many
    fn invalidate_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize;
}

/// Paginated results for every query key
///
/// Each key maps to its own mutex-guarded sequence; locks are held only for
/// short bookkeeping sections, never across a fetch.
pub struct PageCache<T> {
    entries: DashMap<String, Arc<Mutex<PageSequence<T>>>>,
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> std::fmt::Debug for PageCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("keys", &self.entries.len())
            .finish()
    }
}

impl<T: Clone> PageCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sequence(&self, key: &str) -> Arc<Mutex<PageSequence<T>>> {
        let entry = self.entries.entry(key.to_string()).or_default();
        Arc::clone(&*entry)
    }

    /// Number of keys with a sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install page 0 for an empty, idle sequence; returns whether it was used
    pub fn seed(&self, key: &str, page: Page<T>) -> bool {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        if !sequence.pages.is_empty() || sequence.in_flight {
            return false;
        }
        sequence.pages.push(page);
        debug!(key = %key, "Seeded first page from fallback data");
        true
    }

    /// Reserve the next page fetch for `key`
    ///
    /// `next_url` sees the pages fetched so far and returns the URL of the
    /// next one, or `None` when the sequence is over. Returns `None` when a
    /// fetch is already outstanding or there is nothing left to fetch.
    pub fn begin<F>(&self, key: &str, next_url: F) -> Option<Ticket>
    where
        F: FnOnce(&[Page<T>]) -> Option<Url>,
    {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        if sequence.in_flight {
            return None;
        }
        let url = next_url(&sequence.pages)?;
        sequence.in_flight = true;
        Some(Ticket {
            index: sequence.pages.len(),
            epoch: sequence.epoch,
            url,
        })
    }

    /// Apply a fetched page; returns `false` when the ticket went stale
    pub fn complete(&self, key: &str, ticket: &Ticket, page: Page<T>) -> bool {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        if !sequence.accepts(ticket) {
            debug!(key = %key, index = ticket.index, "Dropping stale page");
            return false;
        }
        sequence.pages.push(page);
        sequence.in_flight = false;
        sequence.error = None;
        true
    }

    /// Record a failed fetch; the page stays unfetched
    pub fn fail(&self, key: &str, ticket: &Ticket, message: String) -> bool {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        if !sequence.accepts(ticket) {
            return false;
        }
        sequence.in_flight = false;
        sequence.error = Some(message);
        true
    }

    /// Release a ticket without applying its result
    pub fn abandon(&self, key: &str, ticket: &Ticket) {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        if sequence.accepts(ticket) {
            sequence.in_flight = false;
        }
    }

    /// Copy of one key's sequence
    #[must_use]
    pub fn snapshot(&self, key: &str) -> SequenceSnapshot<T> {
        let Some(entry) = self.entries.get(key) else {
            return SequenceSnapshot::default();
        };
        let sequence = Arc::clone(&*entry);
        drop(entry);
        let sequence = sequence.lock();
        SequenceSnapshot {
            pages: sequence.pages.clone(),
            epoch: sequence.epoch,
            in_flight: sequence.in_flight,
            error: sequence.error.clone(),
        }
    }

    fn reset(&self, key: &str) {
        let sequence = self.sequence(key);
        let mut sequence = sequence.lock();
        sequence.epoch += 1;
        sequence.pages.clear();
        sequence.in_flight = false;
        sequence.error = None;
    }
}

impl<T: Clone + Send + Sync> CacheInvalidator for PageCache<T> {
    fn invalidate(&self, key: &str) {
        self.reset(key);
        debug!(key = %key, "Invalidated page sequence");
    }

    fn invalidate_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.reset(key);
        }
        debug!(count = keys.len(), "Invalidated matching page sequences");
        keys.len()
    }
}
