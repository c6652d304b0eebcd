//! At-most-one-in-flight hand-off
//!
//! The coordinator remembers the last hand-off it started. When asked for a
//! new one it first looks at that task: if it is still running the caller is
//! handed a clone of the same shared future, so every caller observes the
//! same outcome and the remote store never sees two overlapping hand-offs
//! from one local store.

use super::HandOffReport;
use crate::domain::StoreError;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Hand-off outcome shared between every caller that joined it
pub type SharedHandOff = Shared<BoxFuture<'static, Result<HandOffReport, StoreError>>>;

struct InFlight {
    outcome: SharedHandOff,
    done: Arc<AtomicBool>,
}

/// Starts hand-offs, or joins the one already running
#[derive(Default)]
pub struct HandOffCoordinator {
    current: Mutex<Option<InFlight>>,
}

impl HandOffCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a hand-off is running right now
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|f| !f.done.load(Ordering::Acquire))
    }

    /// Returns the running hand-off, or spawns `start()` as a new one
    ///
    /// The work runs on its own tokio task, so it keeps going even if every
    /// caller stops waiting. Must be called from within a tokio runtime.
    pub fn run<F, Fut>(&self, start: F) -> SharedHandOff
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HandOffReport, StoreError>> + Send + 'static,
    {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(in_flight) = current.as_ref() {
            if !in_flight.done.load(Ordering::Acquire) {
                tracing::debug!("Hand-off already in flight; joining it");
                return in_flight.outcome.clone();
            }
        }

        let done = Arc::new(AtomicBool::new(false));
        let task_done = done.clone();
        let work = start();
        let handle = tokio::spawn(async move {
            let outcome = work.await;
            task_done.store(true, Ordering::Release);
            outcome
        });

        let outcome = handle
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(StoreError::HandOff(format!("hand-off task failed: {e}")))
                })
            })
            .boxed()
            .shared();

        *current = Some(InFlight {
            outcome: outcome.clone(),
            done,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let coordinator = HandOffCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let start = |starts: Arc<AtomicUsize>, gate: Arc<Notify>| {
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    gate.notified().await;
                    let mut report = HandOffReport::new();
                    report.add_success();
                    Ok::<_, StoreError>(report)
                }
            }
        };

        let first = coordinator.run(start(starts.clone(), gate.clone()));
        let second = coordinator.run(start(starts.clone(), gate.clone()));
        assert!(coordinator.is_running());

        gate.notify_one();
        let (a, b) = tokio::join!(first, second);

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_new_run_after_completion() {
        let coordinator = HandOffCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let starts = starts.clone();
            coordinator
                .run(move || {
                    starts.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, StoreError>(HandOffReport::new()) }
                })
                .await
                .unwrap();
        }

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_failure_is_shared() {
        let coordinator = HandOffCoordinator::new();
        let err = coordinator
            .run(|| async { Err(StoreError::Remote("unreachable".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
    }
}
