use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use tokio::sync::Mutex;

use crate::errors::DataAccessError;

type Cached = Arc<dyn Any + Send + Sync>;
type PendingFetch = Shared<BoxFuture<'static, Result<Cached, DataAccessError>>>;

#[derive(Default)]
struct Entry {
    value: Option<Cached>,
    stale: bool,
    pending: Option<PendingFetch>,
    generation: u64,
}

/// Request cache keyed by logical query identity.
///
/// A fresh value is returned without calling the fetcher. Concurrent misses
/// on one key share a single in-flight fetch. Failed fetches store nothing,
/// so a value from before an invalidation stays readable through
/// [`QueryCache::peek`]. Entries never expire on their own.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    generations: Arc<AtomicU64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn query<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<Arc<T>, DataAccessError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DataAccessError>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.to_string()).or_default();

            if let (Some(value), false) = (&entry.value, entry.stale) {
                tracing::debug!(key = %key, "query cache hit");
                counter!("mealmate_query_cache_total", "outcome" => "hit").increment(1);
                return downcast(Arc::clone(value), key);
            }

            match &entry.pending {
                Some(pending) => {
                    tracing::debug!(key = %key, "joining in-flight query");
                    counter!("mealmate_query_cache_total", "outcome" => "shared").increment(1);
                    pending.clone()
                }
                None => {
                    tracing::debug!(key = %key, "query cache miss");
                    counter!("mealmate_query_cache_total", "outcome" => "miss").increment(1);
                    entry.generation = self.next_generation();
                    let pending = self.spawn_fetch(key, entry.generation, fetcher());
                    entry.pending = Some(pending.clone());
                    pending
                }
            }
        };

        let value = pending.await?;
        downcast(value, key)
    }

    fn spawn_fetch<T, Fut>(&self, key: &str, generation: u64, fetch: Fut) -> PendingFetch
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, DataAccessError>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();

        async move {
            let result = fetch.await.map(|value| Arc::new(value) as Cached);

            let mut entries = entries.lock().await;
            let mut vacant = false;
            if let Some(entry) = entries.get_mut(&key) {
                // an invalidation since this fetch began owns the entry now
                if entry.generation == generation {
                    entry.pending = None;
                    match &result {
                        Ok(value) => {
                            entry.value = Some(Arc::clone(value));
                            entry.stale = false;
                        }
                        Err(e) => tracing::warn!(key = %key, error = %e, "query failed, nothing cached"),
                    }
                }
                vacant = entry.value.is_none() && entry.pending.is_none();
            }
            if vacant {
                entries.remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Last stored value for `key`, fresh or stale.
    pub async fn peek<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.entries.lock().await;
        let value = entries.get(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Mark `key` stale so the next query refetches.
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            mark_stale(entry, self.next_generation());
        }
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().await;
        for (_, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            mark_stale(entry, self.next_generation());
        }
    }

    /// Unique across keys and removals, so a finished fetch only ever
    /// matches the entry state it started from.
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub async fn evict(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

fn mark_stale(entry: &mut Entry, generation: u64) {
    entry.stale = true;
    entry.generation = generation;
    entry.pending = None;
}

fn downcast<T: Send + Sync + 'static>(value: Cached, key: &str) -> Result<Arc<T>, DataAccessError> {
    value.downcast::<T>().map_err(|_| {
        DataAccessError::Decode(format!(
            "cache entry {key} does not hold a {}",
            std::any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        result: Result<u64, DataAccessError>,
    ) -> impl Future<Output = Result<u64, DataAccessError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            result
        }
    }

    #[tokio::test]
    async fn second_query_is_served_from_cache() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.query("admin:counts", || counting_fetch(&calls, Ok(7))).await.unwrap();
        let second = cache.query("admin:counts", || counting_fetch(&calls, Ok(8))).await.unwrap();

        assert_eq!((*first, *second), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_queries_share_one_fetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cache.query("meals", || counting_fetch(&calls, Ok(1))),
            cache.query("meals", || counting_fetch(&calls, Ok(2))),
            cache.query("meals", || counting_fetch(&calls, Ok(3))),
        );

        assert_eq!((*a.unwrap(), *b.unwrap(), *c.unwrap()), (1, 1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let err = cache
            .query("cooks", || counting_fetch(&calls, Err(DataAccessError::Transport("down".into()))))
            .await
            .unwrap_err();
        assert_eq!(err, DataAccessError::Transport("down".into()));
        assert!(cache.peek::<u64>("cooks").await.is_none());

        let value = cache.query("cooks", || counting_fetch(&calls, Ok(4))).await.unwrap();
        assert_eq!(*value, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_misses_leave_no_entry_behind() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for n in 0..3 {
            let key = format!("meal:{n}");
            let missing = DataAccessError::not_found(key.clone());
            assert!(cache.query(&key, || counting_fetch(&calls, Err(missing))).await.is_err());
        }
        assert!(cache.entries.lock().await.is_empty());

        cache.query("orders", || counting_fetch(&calls, Ok(1))).await.unwrap();
        cache.invalidate("orders").await;
        let _ = cache
            .query("orders", || counting_fetch(&calls, Err(DataAccessError::Transport("down".into()))))
            .await;
        assert!(cache.entries.lock().await.contains_key("orders"));
    }

    #[tokio::test]
    async fn invalidation_refetches_and_keeps_stale_value_on_failure() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.query("orders", || counting_fetch(&calls, Ok(10))).await.unwrap();
        cache.invalidate("orders").await;

        let refetch = cache
            .query("orders", || counting_fetch(&calls, Err(DataAccessError::Transport("down".into()))))
            .await;
        assert!(refetch.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek::<u64>("orders").await.as_deref(), Some(&10));

        let value = cache.query("orders", || counting_fetch(&calls, Ok(11))).await.unwrap();
        assert_eq!(*value, 11);
    }

    #[tokio::test]
    async fn fetch_started_before_invalidation_does_not_overwrite() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let early = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { cache.query("meals", || counting_fetch(&calls, Ok(1))).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.invalidate_prefix("mea").await;

        assert_eq!(*early.await.unwrap().unwrap(), 1);
        assert!(cache.peek::<u64>("meals").await.is_none());
    }

    #[tokio::test]
    async fn type_mismatch_is_a_decode_error() {
        let cache = QueryCache::new();
        cache.query("n", || async { Ok::<u64, DataAccessError>(1) }).await.unwrap();

        let err = cache
            .query::<String, _, _>("n", || async { Ok("x".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Decode(_)));
    }
}
