//! One-shot deadline scheduling.
//!
//! Every pending transaction (and every orphaned response) gets exactly one
//! deadline. Deadlines ride on the tokio timer wheel (a parked timer is a
//! timer-wheel entry, not a blocked worker thread), so the number of
//! pending transactions does not bound the worker pool.
//!
//! Cancellation is best-effort and lives with the caller: a callback that
//! fires after its transaction already finalized must detect "already gone"
//! and do nothing. The scheduler only guarantees the one-shot and the
//! shutdown behavior: after [`TimeoutScheduler::shutdown`], new submissions
//! are dropped and parked timers are released without firing.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Schedules one-shot deadline callbacks.
#[derive(Debug)]
pub struct TimeoutScheduler {
    shutdown_tx: watch::Sender<bool>,
    accepting: AtomicBool,
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutScheduler {
    /// Create a scheduler that accepts submissions.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            accepting: AtomicBool::new(true),
        }
    }

    /// Run `callback` once after `delay`.
    ///
    /// Submissions after [`Self::shutdown`] are silently dropped; callers
    /// that raced shutdown simply lose their deadline, which is acceptable
    /// because in-memory state is abandoned on shutdown anyway.
    pub fn schedule<F>(&self, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            tracing::debug!("Scheduler shut down, dropping timeout submission");
            return;
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                () = sleep(delay) => callback.await,
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Shutdown released a parked timeout");
                }
            }
        });
    }

    /// Stop accepting submissions and release every parked timer.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
    }
}
