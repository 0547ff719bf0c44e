//! Stampede protection
//!
//! Per-key single-flight around a value-producing future: when many
//! callers miss on the same key at once, exactly one runs the factory and
//! every overlapping caller receives the same outcome.
//!
//! Flight slots are created lazily and removed as soon as the last
//! referencing caller drops its handle (the same strong-count-guarded
//! `remove_if` pattern as the lock table), so the table stays bounded by
//! the set of keys currently being computed.

use crate::domain::error::{Error, Result};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One in-flight computation for a key
#[derive(Debug)]
struct FlightSlot<T> {
    /// FIFO gate - the holder is the caller allowed to run the factory
    gate: Mutex<()>,
    /// Outcome left behind for callers that were waiting on the gate
    outcome: StdMutex<Option<Result<T>>>,
}

impl<T> FlightSlot<T> {
    fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            outcome: StdMutex::new(None),
        }
    }
}

/// The outcome cell is only touched outside the factory call, so a
/// poisoned cell still holds a usable value.
fn lock_outcome<T>(cell: &StdMutex<Option<Result<T>>>) -> std::sync::MutexGuard<'_, Option<Result<T>>> {
    cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Per-key mutual exclusion around value production
#[derive(Debug)]
pub struct StampedeProtector<T> {
    flights: DashMap<String, Arc<FlightSlot<T>>>,
}

impl<T> Default for StampedeProtector<T> {
    fn default() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }
}

impl<T: Clone + Send + 'static> StampedeProtector<T> {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Run `factory` for `key`, guaranteeing at most one concurrent
    /// execution per key across all callers of this protector.
    ///
    /// The caller that acquires the gate first runs the factory; callers
    /// that were waiting observe the stored outcome without re-invoking it.
    /// A caller arriving after the flight fully drains starts a fresh one.
    ///
    /// Cancelling a waiting caller unblocks only that caller with
    /// [`Error::Cancelled`]; the in-flight factory is not interrupted.
    /// Failures are not retried here - the stored error reaches every
    /// overlapping caller.
    pub async fn execute_with_lock<F, Fut>(
        &self,
        key: &str,
        factory: F,
        token: &CancellationToken,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if key.trim().is_empty() {
            return Err(Error::invalid_argument("stampede key must not be empty"));
        }

        let slot = self
            .flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(FlightSlot::new()))
            .clone();

        let mut acquired = None;
        let cancelled = tokio::select! {
            guard = slot.gate.lock() => {
                acquired = Some(guard);
                false
            }
            _ = token.cancelled() => true,
        };
        if cancelled {
            drop(acquired);
            self.release(key, slot);
            return Err(Error::Cancelled);
        }
        let guard = acquired.expect("gate guard acquired when not cancelled");

        // A stored outcome means we were a waiter and the flight finished.
        let stored = lock_outcome(&slot.outcome).clone();
        if let Some(outcome) = stored {
            drop(guard);
            self.release(key, slot);
            return outcome;
        }

        if token.is_cancelled() {
            drop(guard);
            self.release(key, slot);
            return Err(Error::Cancelled);
        }

        let result = factory().await;
        *lock_outcome(&slot.outcome) = Some(result.clone());
        drop(guard);
        self.release(key, slot);
        result
    }

    /// Number of keys with an active flight
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn release(&self, key: &str, slot: Arc<FlightSlot<T>>) {
        drop(slot);
        self.flights
            .remove_if(key, |_, entry| Arc::strong_count(entry) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_caller_runs_factory() {
        let protector: StampedeProtector<u32> = StampedeProtector::new();
        let token = CancellationToken::new();

        let value = protector
            .execute_with_lock("k1", || async { Ok(7) }, &token)
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(protector.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_callers_share_one_execution() {
        let protector: Arc<StampedeProtector<u32>> = Arc::new(StampedeProtector::new());
        let invocations = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let protector = Arc::clone(&protector);
            let invocations = Arc::clone(&invocations);
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                protector
                    .execute_with_lock(
                        "shared",
                        || async {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(99_u32)
                        },
                        &token,
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 99);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(protector.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_shared_with_waiters() {
        let protector: Arc<StampedeProtector<u32>> = Arc::new(StampedeProtector::new());
        let invocations = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let protector = Arc::clone(&protector);
            let invocations = Arc::clone(&invocations);
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                protector
                    .execute_with_lock(
                        "failing",
                        || async {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Err(Error::connection("factory blew up"))
                        },
                        &token,
                    )
                    .await
            }));
        }

        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(Error::Connection { .. })
            ));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_each_run_factory() {
        let protector: StampedeProtector<u32> = StampedeProtector::new();
        let invocations = AtomicU32::new(0);
        let token = CancellationToken::new();

        for expected in 1..=3 {
            let value = protector
                .execute_with_lock(
                    "seq",
                    || async {
                        Ok(invocations.fetch_add(1, Ordering::SeqCst) + 1)
                    },
                    &token,
                )
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_stop_flight() {
        let protector: Arc<StampedeProtector<u32>> = Arc::new(StampedeProtector::new());
        let flight_token = CancellationToken::new();
        let waiter_token = CancellationToken::new();

        let first = {
            let protector = Arc::clone(&protector);
            let token = flight_token.clone();
            tokio::spawn(async move {
                protector
                    .execute_with_lock(
                        "slow",
                        || async {
                            tokio::time::sleep(Duration::from_millis(80)).await;
                            Ok(1_u32)
                        },
                        &token,
                    )
                    .await
            })
        };

        // Give the first caller time to acquire the gate.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = {
            let protector = Arc::clone(&protector);
            let token = waiter_token.clone();
            tokio::spawn(async move {
                protector
                    .execute_with_lock("slow", || async { Ok(2_u32) }, &token)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter_token.cancel();

        assert!(matches!(waiter.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(protector.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let protector: StampedeProtector<u32> = StampedeProtector::new();
        let token = CancellationToken::new();
        let result = protector
            .execute_with_lock("  ", || async { Ok(1) }, &token)
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_different_keys_run_in_parallel() {
        let protector: Arc<StampedeProtector<u32>> = Arc::new(StampedeProtector::new());
        let token = CancellationToken::new();
        let started = std::time::Instant::now();

        let mut handles = Vec::new();
        for i in 0..4 {
            let protector = Arc::clone(&protector);
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                protector
                    .execute_with_lock(
                        &format!("key_{}", i),
                        || async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(i)
                        },
                        &token,
                    )
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        // Four serialized flights would take >= 200ms.
        assert!(started.elapsed() < Duration::from_millis(150));
    }
}
