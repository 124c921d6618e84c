//! Prefetch cache
//!
//! Documents fetched ahead of a navigation, keyed by URL without fragment.
//! Each entry holds a shared future so a navigation that starts while the
//! prefetch is still in flight awaits the same request instead of issuing a
//! second one.

use super::error::NavigationError;
use crate::document::FetchedDocument;
use chrono::{DateTime, Utc};
use futures_util::future::{LocalBoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// A prefetched document, shared between the cache and navigations
pub type Prefetched = Rc<FetchedDocument>;

/// In-flight or finished fetch that may be awaited by several parties
pub type PrefetchFuture = Shared<LocalBoxFuture<'static, Result<Prefetched, NavigationError>>>;

/// State of a prefetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchState {
    Pending,
    Ready,
    Failed,
}

/// A cached prefetch
pub struct PrefetchEntry {
    pub url: Url,
    pub started_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub content: Option<Prefetched>,
    pub state: PrefetchState,
    pub(crate) future: PrefetchFuture,
    id: u64,
}

impl PrefetchEntry {
    /// Future resolving to the document, shared with any other waiter
    pub fn future(&self) -> PrefetchFuture {
        self.future.clone()
    }
}

impl fmt::Debug for PrefetchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchEntry")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("started_at", &self.started_at)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Prefetch entries keyed by document key
#[derive(Debug, Default)]
pub struct PrefetchCache {
    entries: HashMap<String, PrefetchEntry>,
    next_id: u64,
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending fetch under `key`. Returns the entry id used to
    /// settle it later.
    pub fn insert_pending(
        &mut self,
        key: String,
        url: Url,
        started_at: DateTime<Utc>,
        future: PrefetchFuture,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.entries.insert(
            key,
            PrefetchEntry {
                url,
                started_at,
                fetched_at: None,
                content: None,
                state: PrefetchState::Pending,
                future,
                id,
            },
        );
        id
    }

    /// Mark entry `id` ready. A no-op if it was consumed or replaced meanwhile.
    pub fn mark_ready(&mut self, key: &str, id: u64, content: Prefetched, at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.id == id => {
                entry.state = PrefetchState::Ready;
                entry.content = Some(content);
                entry.fetched_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Drop a failed entry so that a later request fetches afresh.
    pub fn discard(&mut self, key: &str, id: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.id == id => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the entry for `key`; used when a navigation consumes it.
    pub fn take(&mut self, key: &str) -> Option<PrefetchEntry> {
        self.entries.remove(key)
    }

    pub fn state(&self, key: &str) -> Option<PrefetchState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict ready entries fetched more than `retention` ago. Pending entries
    /// are kept. Returns the number of evicted entries.
    pub fn evict_stale(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| match (entry.state, entry.fetched_at) {
            (PrefetchState::Ready, Some(fetched_at)) => now
                .signed_duration_since(fetched_at)
                .to_std()
                .map(|age| age <= retention)
                .unwrap_or(true),
            _ => true,
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn ready_future(url: &Url) -> PrefetchFuture {
        let doc = FetchedDocument::from_html(url.clone(), "<body>x</body>");
        futures_util::future::ready(Ok(Rc::new(doc)))
            .boxed_local()
            .shared()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_pending_then_ready() {
        let url = Url::parse("https://app.test/docs").unwrap();
        let mut cache = PrefetchCache::new();

        let id = cache.insert_pending("k".into(), url.clone(), at(0), ready_future(&url));
        assert_eq!(cache.state("k"), Some(PrefetchState::Pending));

        let doc = Rc::new(FetchedDocument::from_html(url, "<body>x</body>"));
        assert!(cache.mark_ready("k", id, doc, at(1)));
        assert_eq!(cache.state("k"), Some(PrefetchState::Ready));
    }

    #[test]
    fn test_settling_a_replaced_entry_is_ignored() {
        let url = Url::parse("https://app.test/docs").unwrap();
        let mut cache = PrefetchCache::new();

        let old = cache.insert_pending("k".into(), url.clone(), at(0), ready_future(&url));
        cache.take("k");
        let new = cache.insert_pending("k".into(), url.clone(), at(1), ready_future(&url));

        assert!(!cache.discard("k", old));
        assert!(cache.contains("k"));
        assert!(cache.discard("k", new));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_stale_keeps_fresh_and_pending() {
        let url = Url::parse("https://app.test/a").unwrap();
        let mut cache = PrefetchCache::new();
        let doc = Rc::new(FetchedDocument::from_html(url.clone(), "a"));

        let old = cache.insert_pending("old".into(), url.clone(), at(0), ready_future(&url));
        cache.mark_ready("old", old, Rc::clone(&doc), at(0));
        let fresh = cache.insert_pending("fresh".into(), url.clone(), at(20), ready_future(&url));
        cache.mark_ready("fresh", fresh, doc, at(20));
        cache.insert_pending("pending".into(), url.clone(), at(0), ready_future(&url));

        let evicted = cache.evict_stale(at(40), Duration::from_secs(30));
        assert_eq!(evicted, 1);
        assert!(!cache.contains("old"));
        assert!(cache.contains("fresh"));
        assert!(cache.contains("pending"));
    }

    #[tokio::test]
    async fn test_taken_future_resolves() {
        let url = Url::parse("https://app.test/a").unwrap();
        let mut cache = PrefetchCache::new();
        cache.insert_pending("a".into(), url.clone(), at(0), ready_future(&url));

        let entry = cache.take("a").unwrap();
        let doc = entry.future().await.unwrap();
        assert_eq!(doc.body, "x");
        assert_eq!(cache.len(), 0);
    }
}
