//! Job queue and bounded worker pool.
//!
//! Decouples submission from execution: `submit` durably records the job
//! and returns immediately; a fixed pool of workers pulls jobs and runs
//! the pipeline, retrying transient failures with exponential backoff.
//! A retry re-runs the whole pipeline from `pending` for the same order
//! id; downstream side effects of a partially successful earlier attempt
//! are not de-duplicated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::domain::Order;
use crate::error::{Result, SwaplineError};
use crate::events::Broadcaster;
use crate::pipeline::OrderPipeline;
use crate::queue::JobStore;

pub struct JobQueue {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Order>>>,
    store: Arc<dyn JobStore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Start the worker pool and return the queue handle.
    pub fn start(
        config: QueueConfig,
        pipeline: Arc<OrderPipeline>,
        broadcaster: Arc<Broadcaster>,
        store: Arc<dyn JobStore>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Order>();
        let rx = Arc::new(Mutex::new(rx));
        let depth = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            workers.push(tokio::spawn(Self::worker_loop(
                worker_id,
                config.clone(),
                Arc::clone(&rx),
                Arc::clone(&pipeline),
                Arc::clone(&broadcaster),
                Arc::clone(&store),
                Arc::clone(&depth),
            )));
        }
        info!(workers = config.workers, "job queue started");

        Arc::new(Self {
            tx: std::sync::Mutex::new(Some(tx)),
            store,
            workers: Mutex::new(workers),
            depth,
        })
    }

    /// Durably record a job for the order and dispatch it. Returns as
    /// soon as intake is durable; never blocks on execution. Fails
    /// loudly (`QueueIntake`) if the store or the dispatch channel is
    /// down — a submitted order is never silently dropped.
    pub async fn submit(&self, order: Order) -> Result<()> {
        self.store
            .insert(&order)
            .await
            .map_err(|e| SwaplineError::QueueIntake(format!("durable enqueue failed: {e}")))?;

        let tx = {
            let guard = self
                .tx
                .lock()
                .map_err(|_| SwaplineError::QueueIntake("queue intake poisoned".into()))?;
            guard
                .clone()
                .ok_or_else(|| SwaplineError::QueueIntake("queue is shut down".into()))?
        };
        let order_id = order.order_id;
        // Count the job before it becomes visible to workers; a worker
        // decrementing first would wrap the counter.
        self.depth.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = tx.send(order) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(SwaplineError::QueueIntake(format!("dispatch failed: {e}")));
        }
        debug!(%order_id, "job enqueued");
        Ok(())
    }

    /// Jobs not yet terminal, for inspection and recovery tooling.
    pub async fn pending_jobs(&self) -> Result<Vec<crate::queue::JobRecord>> {
        self.store.pending_jobs().await
    }

    /// Jobs dispatched but not yet picked up by a worker.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Stop intake and wait for workers to drain and exit.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                error!("worker task panicked: {e}");
            }
        }
        info!("job queue drained and stopped");
    }

    async fn worker_loop(
        worker_id: usize,
        config: QueueConfig,
        rx: Arc<Mutex<mpsc::UnboundedReceiver<Order>>>,
        pipeline: Arc<OrderPipeline>,
        broadcaster: Arc<Broadcaster>,
        store: Arc<dyn JobStore>,
        depth: Arc<AtomicUsize>,
    ) {
        loop {
            // Hold the receiver lock only for the dequeue itself so the
            // pool stays concurrent across jobs.
            let order = { rx.lock().await.recv().await };
            let Some(mut order) = order else {
                debug!(worker_id, "queue closed, worker exiting");
                break;
            };
            depth.fetch_sub(1, Ordering::SeqCst);

            let order_id = order.order_id;
            debug!(worker_id, %order_id, "worker picked up job");

            // Guard against a cleanup timer left over from a terminal
            // state if this order is somehow re-attempted.
            broadcaster.cancel_cleanup(order_id);

            let mut attempt: u32 = 1;
            loop {
                match pipeline.run(&mut order).await {
                    Ok(_) => {
                        if let Err(e) = store.mark_completed(&order, attempt).await {
                            warn!(%order_id, "failed to record job completion: {e}");
                        }
                        info!(worker_id, %order_id, attempt, "job completed");
                        break;
                    }
                    Err(err) if attempt < config.max_attempts && err.is_retryable() => {
                        let delay = config.backoff_delay(attempt);
                        warn!(
                            worker_id,
                            %order_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            "attempt failed, retrying: {err}"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        if let Err(e) = store.mark_failed(&order, attempt, &err.to_string()).await {
                            warn!(%order_id, "failed to record job failure: {e}");
                        }
                        error!(worker_id, %order_id, attempt, "job permanently failed: {err}");
                        break;
                    }
                }
            }

            broadcaster.schedule_cleanup(order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, Quote, SubmitOrderRequest, SwapReceipt};
    use crate::persistence::MemoryStatusSink;
    use crate::provider::DexProvider;
    use crate::queue::{JobState, MemoryJobStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    /// Provider that fails the quote stage a fixed number of times per
    /// order, and tracks peak concurrency across orders.
    struct CountingProvider {
        failures_per_order: u32,
        calls: dashmap::DashMap<uuid::Uuid, u32>,
        in_flight: AtomicU32,
        peak: AtomicU32,
        hold: Duration,
    }

    impl CountingProvider {
        fn new(failures_per_order: u32, hold: Duration) -> Self {
            Self {
                failures_per_order,
                calls: dashmap::DashMap::new(),
                in_flight: AtomicU32::new(0),
                peak: AtomicU32::new(0),
                hold,
            }
        }

        fn attempts(&self, order_id: uuid::Uuid) -> u32 {
            self.calls.get(&order_id).map(|c| *c).unwrap_or(0)
        }
    }

    #[async_trait]
    impl DexProvider for CountingProvider {
        async fn get_quotes(&self, order: &Order) -> crate::error::Result<Vec<Quote>> {
            let seen = {
                let mut entry = self.calls.entry(order.order_id).or_insert(0);
                *entry += 1;
                *entry
            };
            if seen <= self.failures_per_order {
                return Err(SwaplineError::Execution("transient venue error".into()));
            }
            Ok(vec![Quote {
                source: "meteora".into(),
                price: dec!(99.8),
                fee: dec!(0.002),
            }])
        }

        async fn execute_swap(&self, _venue: &str, _order: &Order) -> crate::error::Result<SwapReceipt> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SwapReceipt {
                tx_hash: "mocktx_queue00000".into(),
                executed_price: dec!(100),
            })
        }
    }

    fn order() -> Order {
        Order::new(SubmitOrderRequest {
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount: dec!(1),
            slippage: None,
        })
    }

    struct Harness {
        queue: Arc<JobQueue>,
        broadcaster: Arc<Broadcaster>,
        store: Arc<MemoryJobStore>,
        provider: Arc<CountingProvider>,
        sink: Arc<MemoryStatusSink>,
    }

    fn harness(config: QueueConfig, provider: CountingProvider) -> Harness {
        let broadcaster = Broadcaster::new(Duration::from_secs(60));
        let sink = Arc::new(MemoryStatusSink::new());
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = Arc::new(OrderPipeline::new(
            provider.clone(),
            Arc::clone(&broadcaster),
            sink.clone(),
            0,
        ));
        let queue = JobQueue::start(config, pipeline, Arc::clone(&broadcaster), store.clone());
        Harness {
            queue,
            broadcaster,
            store,
            provider,
            sink,
        }
    }

    fn fast_config(workers: usize, max_attempts: u32) -> QueueConfig {
        QueueConfig {
            workers,
            max_attempts,
            base_backoff_ms: 1,
        }
    }

    async fn statuses(broadcaster: &Arc<Broadcaster>, order_id: uuid::Uuid) -> Vec<OrderStatus> {
        let (_, mut rx) = broadcaster.attach(order_id);
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.status);
        }
        out
    }

    #[tokio::test]
    async fn submit_returns_before_execution_finishes() {
        let h = harness(
            fast_config(2, 3),
            CountingProvider::new(0, Duration::from_millis(50)),
        );
        let order = order();
        let id = order.order_id;
        h.queue.submit(order).await.expect("submit");
        // Job recorded durably at submit time, before the pipeline ends.
        assert_eq!(h.store.job(id).await.expect("job").state, JobState::Pending);

        h.queue.shutdown().await;
        let job = h.store.job(id).await.expect("job");
        assert_eq!(job.state, JobState::Completed);
        // The stored snapshot carries the outcome, not the intake state.
        assert_eq!(job.order.status, OrderStatus::Confirmed);
        assert_eq!(job.order.route.as_deref(), Some("meteora"));
        assert!(job.order.tx_hash.is_some());
        assert!(job.order.executed_price.is_some());
    }

    #[tokio::test]
    async fn depth_balances_to_zero_after_drain() {
        let h = harness(
            fast_config(2, 1),
            CountingProvider::new(0, Duration::from_millis(10)),
        );
        for _ in 0..6 {
            h.queue.submit(order()).await.expect("submit");
        }
        assert!(h.queue.depth() <= 6);
        h.queue.shutdown().await;
        assert_eq!(h.queue.depth(), 0);
    }

    #[tokio::test]
    async fn failing_provider_exhausts_exactly_max_attempts() {
        let h = harness(
            fast_config(1, 3),
            CountingProvider::new(u32::MAX, Duration::ZERO),
        );
        let order = order();
        let id = order.order_id;
        h.queue.submit(order).await.expect("submit");
        h.queue.shutdown().await;

        assert_eq!(h.provider.attempts(id), 3);
        let job = h.store.job(id).await.expect("job");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.order.status, OrderStatus::Failed);
        assert!(job.order.error.is_some());

        // Each attempt re-emits its own pending → routing → failed run.
        let seq = statuses(&h.broadcaster, id).await;
        let expected: Vec<OrderStatus> = std::iter::repeat([
            OrderStatus::Pending,
            OrderStatus::Routing,
            OrderStatus::Failed,
        ])
        .take(3)
        .flatten()
        .collect();
        assert_eq!(seq, expected);
        assert_eq!(h.sink.status_of(id).await, Some(OrderStatus::Failed));
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let h = harness(fast_config(1, 3), CountingProvider::new(2, Duration::ZERO));
        let order = order();
        let id = order.order_id;
        h.queue.submit(order).await.expect("submit");
        h.queue.shutdown().await;

        assert_eq!(h.provider.attempts(id), 3);
        assert_eq!(h.store.job(id).await.expect("job").state, JobState::Completed);
        let seq = statuses(&h.broadcaster, id).await;
        assert_eq!(seq.last(), Some(&OrderStatus::Confirmed));
        // Two failed attempts remain in history, undeduplicated.
        assert_eq!(
            seq.iter().filter(|s| **s == OrderStatus::Failed).count(),
            2
        );
    }

    #[tokio::test]
    async fn worker_pool_bounds_concurrency_and_finishes_all() {
        let workers = 3;
        let n = 8;
        let h = harness(
            fast_config(workers, 1),
            CountingProvider::new(0, Duration::from_millis(30)),
        );

        let mut ids = HashSet::new();
        for _ in 0..n {
            let order = order();
            ids.insert(order.order_id);
            h.queue.submit(order).await.expect("submit");
        }
        h.queue.shutdown().await;

        assert!(h.provider.peak.load(Ordering::SeqCst) <= workers as u32);
        for id in ids {
            assert_eq!(
                h.store.job(id).await.expect("job").state,
                JobState::Completed
            );
        }
        assert!(h.queue.pending_jobs().await.expect("pending").is_empty());
    }

    #[tokio::test]
    async fn storage_loss_fails_submit_loudly() {
        let h = harness(fast_config(1, 1), CountingProvider::new(0, Duration::ZERO));
        h.store.reject_inserts(true);
        let err = h.queue.submit(order()).await.expect_err("must fail");
        assert!(matches!(err, SwaplineError::QueueIntake(_)));
        h.store.reject_inserts(false);
        h.queue.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let h = harness(fast_config(1, 1), CountingProvider::new(0, Duration::ZERO));
        h.queue.shutdown().await;
        let err = h.queue.submit(order()).await.expect_err("must fail");
        assert!(matches!(err, SwaplineError::QueueIntake(_)));
    }
}
