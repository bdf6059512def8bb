//! Bounded worker pool for accepted connections.
//!
//! # Responsibilities
//! - Run one task per accepted connection
//! - Cap the number of concurrently *active* workers with a semaphore
//! - Let the accept loop reclaim finished workers between accepts
//! - Drain in-flight workers within a bounded window on shutdown
//!
//! # Design Decisions
//! - The pool is owned by the accept loop and mutated only there, so the
//!   task bookkeeping (`JoinSet`) needs no lock
//! - Spawning never waits: a connection beyond the cap is parked on the
//!   semaphore until a worker finishes, behind the OS accept backlog
//! - Draining is best-effort; stragglers are aborted when the window closes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// A pool of connection workers with a fixed concurrency cap.
#[derive(Debug)]
pub struct WorkerPool {
    tasks: JoinSet<()>,
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    /// Create a pool allowing at most `max_workers` (minimum 1) active workers.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    /// Hand `work` to a worker without waiting for a free slot.
    pub fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let _active = ActiveWorker::enter();
            work.await;
        });
    }

    /// Reclaim every finished worker. Returns how many were reclaimed.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.tasks.try_join_next() {
            log_abnormal_exit(result);
            reaped += 1;
        }
        reaped
    }

    /// Workers currently holding a slot.
    pub fn active(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }

    /// Workers not yet reclaimed, active or waiting for a slot.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Wait up to `window` for outstanding workers, then abort the rest.
    pub async fn drain(mut self, window: Duration) {
        let outstanding = self.tasks.len();
        if outstanding > 0 {
            tracing::info!(outstanding, "Waiting for workers to finish");
        }

        let finished = tokio::time::timeout(window, async {
            while let Some(result) = self.tasks.join_next().await {
                log_abnormal_exit(result);
            }
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                aborted = self.tasks.len(),
                window_secs = window.as_secs_f64(),
                "Drain window elapsed, aborting remaining workers"
            );
            self.tasks.shutdown().await;
        }
    }
}

fn log_abnormal_exit(result: Result<(), JoinError>) {
    if let Err(error) = result {
        if error.is_panic() {
            tracing::error!(error = %error, "Connection worker panicked");
        }
    }
}

/// Keeps the active-worker gauge in step, panics included.
struct ActiveWorker;

impl ActiveWorker {
    fn enter() -> Self {
        metrics::gauge!("proxy_active_workers").increment(1.0);
        Self
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        metrics::gauge!("proxy_active_workers").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(WorkerPool::new(0).max_workers(), 1);
    }

    #[tokio::test]
    async fn active_workers_never_exceed_cap() {
        let mut pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(pool.len(), 8);
        assert!(pool.active() <= 2);

        pool.drain(Duration::from_secs(5)).await;
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn reap_reclaims_finished_workers() {
        let mut pool = WorkerPool::new(4);
        pool.spawn(async {});
        pool.spawn(async {});

        let mut reaped = 0;
        for _ in 0..100 {
            reaped += pool.reap();
            if reaped == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reaped, 2);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn drain_aborts_stragglers() {
        let mut pool = WorkerPool::new(1);
        pool.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let started = std::time::Instant::now();
        pool.drain(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
