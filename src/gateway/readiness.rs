//! Gateway readiness barrier.
//!
//! Counts distinct gateways that reported ready and wakes waiters on every
//! report. Each configured gateway counts at most once; unknown names are
//! ignored. No gateways means the barrier is already open.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{ready}/{target} gateways ready after {waited:?}")]
pub struct ReadinessTimeout {
    pub ready: usize,
    pub target: usize,
    pub waited: Duration,
}

#[derive(Debug)]
pub struct ReadinessBarrier {
    expected: HashSet<String>,
    reported: Mutex<HashSet<String>>,
    count: watch::Sender<usize>,
}

impl ReadinessBarrier {
    /// Barrier expecting one signal per named gateway.
    pub fn new<I, S>(gateways: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (count, _) = watch::channel(0);
        Self {
            expected: gateways.into_iter().map(Into::into).collect(),
            reported: Mutex::new(HashSet::new()),
            count,
        }
    }

    /// Number of gateways the barrier waits for.
    pub fn target(&self) -> usize {
        self.expected.len()
    }

    /// Distinct gateways that have signalled so far.
    pub fn ready_count(&self) -> usize {
        *self.count.borrow()
    }

    /// True once every expected gateway has signalled.
    pub fn is_open(&self) -> bool {
        self.ready_count() >= self.target()
    }

    /// One-shot signal for `gateway`.
    pub fn signal_for(self: &Arc<Self>, gateway: impl Into<String>) -> ReadySignal {
        ReadySignal {
            gateway: gateway.into(),
            barrier: Arc::clone(self),
            fired: AtomicBool::new(false),
        }
    }

    fn mark_ready(&self, gateway: &str) -> bool {
        if !self.expected.contains(gateway) {
            tracing::warn!(gateway, "Ignoring readiness from unknown gateway");
            return false;
        }

        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        if !reported.insert(gateway.to_string()) {
            return false;
        }
        let ready = reported.len();
        // Published while holding the lock so counts arrive in order.
        self.count.send_replace(ready);
        drop(reported);

        metrics::record_gateways_ready(ready);
        tracing::info!(gateway, ready, expected = self.target(), "Gateway ready");
        true
    }

    /// Resolve once every gateway reported ready.
    ///
    /// `None` waits indefinitely.
    pub async fn wait_until_all_ready(&self, timeout: Option<Duration>) -> Result<(), ReadinessTimeout> {
        let target = self.target();
        if target == 0 {
            return Ok(());
        }

        let mut rx = self.count.subscribe();
        let all_ready = rx.wait_for(|ready| *ready >= target);

        let Some(limit) = timeout else {
            // The sender lives in `self`, so the wait cannot fail.
            let _ = all_ready.await;
            return Ok(());
        };

        let reached = tokio::time::timeout(limit, all_ready).await.is_ok();
        if reached {
            Ok(())
        } else {
            Err(ReadinessTimeout {
                ready: self.ready_count(),
                target,
                waited: limit,
            })
        }
    }
}

/// A gateway's one-shot "ready" report.
#[derive(Debug)]
pub struct ReadySignal {
    gateway: String,
    barrier: Arc<ReadinessBarrier>,
    fired: AtomicBool,
}

impl ReadySignal {
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Report ready. Only the first call has an effect; returns whether it counted.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.barrier.mark_ready(&self.gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_gateways_resolve_immediately() {
        let barrier = ReadinessBarrier::new(Vec::<String>::new());
        assert!(barrier.is_open());
        barrier
            .wait_until_all_ready(Some(Duration::from_millis(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_after_every_gateway_reports() {
        let barrier = Arc::new(ReadinessBarrier::new(["a", "b"]));
        let a = barrier.signal_for("a");
        let b = barrier.signal_for("b");

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait_until_all_ready(None).await })
        };

        assert!(a.fire());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        assert!(b.fire());
        waiter.await.unwrap().unwrap();
        assert_eq!(barrier.ready_count(), 2);
    }

    #[tokio::test]
    async fn repeated_signal_counts_once() {
        let barrier = Arc::new(ReadinessBarrier::new(["a", "b"]));
        let a = barrier.signal_for("a");
        assert!(a.fire());
        assert!(!a.fire());

        // A second handle for the same gateway does not count either.
        assert!(!barrier.signal_for("a").fire());
        assert_eq!(barrier.ready_count(), 1);

        let err = barrier
            .wait_until_all_ready(Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err.ready, 1);
        assert_eq!(err.target, 2);
    }

    #[tokio::test]
    async fn unknown_gateway_is_ignored() {
        let barrier = Arc::new(ReadinessBarrier::new(["a"]));
        assert!(!barrier.signal_for("stranger").fire());
        assert_eq!(barrier.ready_count(), 0);
        assert!(!barrier.is_open());
    }

    #[tokio::test]
    async fn already_open_barrier_returns_without_waiting() {
        let barrier = Arc::new(ReadinessBarrier::new(["a"]));
        barrier.signal_for("a").fire();
        barrier
            .wait_until_all_ready(Some(Duration::from_millis(1)))
            .await
            .unwrap();
    }
}
