//! Invalidation Worker Pool
//!
//! Bounded queue plus a fixed set of worker tasks for eviction fan-out.
//! Dispatch never blocks the caller on a healthy queue; when the queue is
//! full or the pool has stopped, the event is processed inline on the
//! submitting task instead of being dropped. Slower commits in that case,
//! but no lost invalidations.
//!
//! Shutdown closes the queue, lets the workers drain every accepted event,
//! and joins them.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::events::InvalidationEvent;
use crate::error::{Error, Result};

type Handler = Arc<dyn Fn(InvalidationEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct InvalidationPoolConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Queue slots before dispatch falls back to the submitter
    pub queue_depth: usize,
}

impl Default for InvalidationPoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_depth: 64,
        }
    }
}

/// Pool statistics snapshot
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub workers: usize,
    pub queue_depth: usize,
    /// Events accepted onto the queue
    pub queued: u64,
    /// Events processed on the submitting task because the queue was
    /// full or the pool had stopped
    pub inline_runs: u64,
    /// Events whose processing completed, on any task
    pub processed: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    queued: AtomicU64,
    inline_runs: AtomicU64,
    processed: AtomicU64,
}

/// Fixed-size async worker pool over a bounded event queue
pub struct InvalidationPool {
    config: InvalidationPoolConfig,
    /// Taken on shutdown; a `None` here means the pool has stopped
    tx: Mutex<Option<mpsc::Sender<InvalidationEvent>>>,
    handler: Handler,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
}

impl InvalidationPool {
    /// Start the pool. Must be called from within a Tokio runtime, since
    /// the workers are spawned here.
    pub fn new<F, Fut>(config: InvalidationPoolConfig, handler: F) -> Result<Self>
    where
        F: Fn(InvalidationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if config.workers == 0 {
            return Err(Error::Config(
                "invalidation pool needs at least one worker".to_string(),
            ));
        }
        if config.queue_depth == 0 {
            return Err(Error::Config(
                "invalidation queue depth must be positive".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(config.queue_depth);
        let rx = Arc::new(AsyncMutex::new(rx));
        let handler: Handler =
            Arc::new(move |event| -> BoxFuture<'static, ()> { Box::pin(handler(event)) });
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            workers.push(tokio::spawn(Self::worker_loop(
                id,
                Arc::clone(&rx),
                Arc::clone(&handler),
                Arc::clone(&counters),
            )));
        }

        Ok(Self {
            config,
            tx: Mutex::new(Some(tx)),
            handler,
            workers: Mutex::new(workers),
            counters,
        })
    }

    async fn worker_loop(
        id: usize,
        rx: Arc<AsyncMutex<mpsc::Receiver<InvalidationEvent>>>,
        handler: Handler,
        counters: Arc<PoolCounters>,
    ) {
        debug!(worker = id, "invalidation worker started");
        loop {
            // Receiver lock is released before the event is processed so
            // the other workers keep draining the queue
            let event = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };

            match event {
                Some(event) => {
                    handler(event).await;
                    counters.processed.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    debug!(worker = id, "invalidation worker stopped");
                    break;
                }
            }
        }
    }

    /// Hand an event to the pool. Falls back to processing it on the
    /// calling task when the queue is full or the pool has stopped.
    pub async fn dispatch(&self, event: InvalidationEvent) {
        let sender = self.tx.lock().clone();
        let Some(tx) = sender else {
            warn!(
                event_type = event.event_type(),
                "invalidation pool stopped, running on submitter"
            );
            self.run_inline(event).await;
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(event)) => {
                warn!(
                    event_type = event.event_type(),
                    "invalidation queue full, running on submitter"
                );
                self.run_inline(event).await;
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    event_type = event.event_type(),
                    "invalidation pool stopped, running on submitter"
                );
                self.run_inline(event).await;
            }
        }
    }

    async fn run_inline(&self, event: InvalidationEvent) {
        self.counters.inline_runs.fetch_add(1, Ordering::Relaxed);
        (self.handler)(event).await;
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop accepting queued work, drain every accepted event, and join
    /// the workers. Safe to call more than once.
    pub async fn shutdown(&self) {
        let sender = self.tx.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock();
            workers.drain(..).collect()
        };
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "invalidation worker terminated abnormally");
            }
        }
        info!("invalidation pool stopped");
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.config.workers,
            queue_depth: self.config.queue_depth,
            queued: self.counters.queued.load(Ordering::Relaxed),
            inline_runs: self.counters.inline_runs.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for InvalidationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationPool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn counting_pool(config: InvalidationPoolConfig) -> (InvalidationPool, Arc<AtomicU32>) {
        let counter = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&counter);
        let pool = InvalidationPool::new(config, move |_event| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
        (pool, counter)
    }

    #[tokio::test]
    async fn test_workers_process_dispatched_events() {
        let (pool, counter) = counting_pool(InvalidationPoolConfig::default());

        for _ in 0..3 {
            pool.dispatch(InvalidationEvent::role_permission_changed("admin"))
                .await;
        }
        pool.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.stats().processed, 3);
    }

    #[tokio::test]
    async fn test_shutdown_drains_accepted_events() {
        let (pool, counter) = counting_pool(InvalidationPoolConfig {
            workers: 1,
            queue_depth: 16,
        });

        for _ in 0..5 {
            pool.dispatch(InvalidationEvent::role_permission_changed("admin"))
                .await;
        }
        // events may still be queued here; shutdown must not lose them
        pool.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_full_queue_runs_on_submitter() {
        let counter = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&counter);
        let pool = InvalidationPool::new(
            InvalidationPoolConfig {
                workers: 1,
                queue_depth: 1,
            },
            move |_event| {
                let seen = Arc::clone(&seen);
                async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .unwrap();

        for _ in 0..3 {
            pool.dispatch(InvalidationEvent::role_permission_changed("admin"))
                .await;
        }
        pool.shutdown().await;

        let stats = pool.stats();
        assert!(stats.inline_runs >= 1);
        assert_eq!(stats.processed, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_runs_inline() {
        let (pool, counter) = counting_pool(InvalidationPoolConfig::default());
        pool.shutdown().await;

        pool.dispatch(InvalidationEvent::user_role_assigned("u1", "admin"))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().inline_runs, 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (pool, _counter) = counting_pool(InvalidationPoolConfig::default());
        pool.shutdown().await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let result = InvalidationPool::new(
            InvalidationPoolConfig {
                workers: 0,
                queue_depth: 8,
            },
            |_event| async {},
        );
        assert_matches!(result.unwrap_err(), Error::Config(_));

        let result = InvalidationPool::new(
            InvalidationPoolConfig {
                workers: 2,
                queue_depth: 0,
            },
            |_event| async {},
        );
        assert_matches!(result.unwrap_err(), Error::Config(_));
    }
}
