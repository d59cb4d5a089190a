// Small async utilities: debounced call scheduling and a keyed result cache.
//
// Used by the issue-search suggestion flow (search-as-you-type against an
// external source). Superseded invocations are cancelled by aborting the
// previously scheduled task before the new one is spawned; only the last
// call within the debounce window fires.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Schedules a task to run after a quiet period, cancelling any previously
/// scheduled task that has not fired yet.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    /// Schedule `task` to run after the debounce delay. A task scheduled by
    /// a previous call that has not started yet is aborted.
    pub fn call<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Abort the pending task, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Memo
// ---------------------------------------------------------------------------

/// A call-result cache keyed by argument.
///
/// Single-owner: lives on the task that performs the fetches, so no locking
/// is involved.
#[derive(Debug, Default)]
pub struct Memo<K, V> {
    cache: HashMap<K, V>,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Memo {
            cache: HashMap::new(),
        }
    }

    /// Cached value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).cloned()
    }

    /// Record a fetched result.
    pub fn insert(&mut self, key: K, value: V) {
        self.cache.insert(key, value);
    }

    /// Return the cached value for `key`, fetching and recording it on a miss.
    pub async fn get_or_fetch<F, Fut, E>(&mut self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }
        let value = fetch().await?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn debouncer_runs_only_last_call() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            debouncer.call(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        // Let the surviving spawned task run to completion.
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_cancel_suppresses_pending_call() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        let inner = Arc::clone(&counter);
        debouncer.call(async move {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_spaced_calls_all_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(50));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            debouncer.call(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn memo_fetches_once_per_key() {
        let calls = AtomicUsize::new(0);
        let mut memo: Memo<String, usize> = Memo::new();

        for _ in 0..3 {
            let value: Result<usize, ()> = memo
                .get_or_fetch("k".to_string(), || async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 40)
                })
                .await;
            assert_eq!(value.unwrap(), 40);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other: Result<usize, ()> = memo
            .get_or_fetch("other".to_string(), || async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 40)
            })
            .await;
        assert_eq!(other.unwrap(), 41);
    }

    #[tokio::test]
    async fn memo_does_not_cache_failures() {
        let mut memo: Memo<&'static str, usize> = Memo::new();
        let failed: Result<usize, &str> = memo.get_or_fetch("k", || async { Err("boom") }).await;
        assert!(failed.is_err());

        let ok: Result<usize, &str> = memo.get_or_fetch("k", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
