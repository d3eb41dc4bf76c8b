//! Request coalescing: at most one computation in flight per key.
//!
//! The first caller for a key installs a shared future and drives it;
//! concurrent callers clone the same future and observe the identical
//! outcome, success or error. The computation itself removes its registry
//! entry once settled, so the entry lifetime is exactly the computation
//! lifetime regardless of how it ended.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::error::AnalyticsError;

type SharedComputation<T> = Shared<BoxFuture<'static, Result<T, AnalyticsError>>>;

pub struct FlightGroup<T: Clone> {
    inflight: Arc<Mutex<HashMap<String, SharedComputation<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight computation for `key`, or install `work` as the
    /// one computation and await it. `work` is only invoked when no
    /// computation exists for the key.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, AnalyticsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AnalyticsError>> + Send + 'static,
    {
        let computation = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(key) {
                existing.clone()
            } else {
                let registry = Arc::clone(&self.inflight);
                let owned_key = key.to_string();
                let inner = work();
                let computation = async move {
                    let outcome = inner.await;
                    // Unconditional removal: success and failure both clear
                    // the slot so the next request starts fresh.
                    registry.lock().await.remove(&owned_key);
                    outcome
                }
                .boxed()
                .shared();
                inflight.insert(key.to_string(), computation.clone());
                computation
            }
        };
        computation.await
    }

    #[cfg(test)]
    async fn inflight_len(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn burst_of_fifty_runs_the_work_once() {
        let group = Arc::new(FlightGroup::<u64>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let group = group.clone();
            let invocations = invocations.clone();
            handles.push(tokio::spawn(async move {
                group
                    .run("agg_v10:biometric:all", move || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        // Deliberately slow so the whole burst attaches.
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(170)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 170);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(group.inflight_len().await, 0);
    }

    #[tokio::test]
    async fn waiters_share_the_original_error() {
        let group = Arc::new(FlightGroup::<u64>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let group = group.clone();
            let invocations = invocations.clone();
            handles.push(tokio::spawn(async move {
                group
                    .run("k", move || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<u64, _>(AnalyticsError::MalformedSource {
                            detail: "bad chunk".to_string(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AnalyticsError::MalformedSource { .. }));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_clears_after_failure_so_retry_recomputes() {
        let group = FlightGroup::<u64>::new();
        let first = group
            .run("k", || async {
                Err::<u64, _>(AnalyticsError::Internal("boom".to_string()))
            })
            .await;
        assert!(first.is_err());
        assert_eq!(group.inflight_len().await, 0);

        let second = group.run("k", || async { Ok(9) }).await;
        assert_eq!(second.unwrap(), 9);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let group = Arc::new(FlightGroup::<u64>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let a = {
            let invocations = invocations.clone();
            group.run("a", move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
        };
        let b = {
            let invocations = invocations.clone();
            group.run("b", move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
        };
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }
}
