//! Order execution state machine.
//!
//! Drives a single order through pending → routing → building →
//! submitted → confirmed, emitting one broadcaster event and one status
//! upsert per transition. A failure at any stage emits a `failed` event,
//! persists the failed snapshot, and propagates the original error to
//! the job queue for retry accounting.

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{best_quote, Order, OrderStatus, SwapReceipt};
use crate::error::{Result, SwaplineError};
use crate::events::Broadcaster;
use crate::persistence::StatusSink;
use crate::provider::DexProvider;

pub struct OrderPipeline {
    provider: Arc<dyn DexProvider>,
    broadcaster: Arc<Broadcaster>,
    sink: Arc<dyn StatusSink>,
    /// Upper bound per provider call; `None` disables the bound.
    stage_timeout: Option<Duration>,
}

impl OrderPipeline {
    pub fn new(
        provider: Arc<dyn DexProvider>,
        broadcaster: Arc<Broadcaster>,
        sink: Arc<dyn StatusSink>,
        stage_timeout_ms: u64,
    ) -> Self {
        Self {
            provider,
            broadcaster,
            sink,
            stage_timeout: (stage_timeout_ms > 0).then(|| Duration::from_millis(stage_timeout_ms)),
        }
    }

    /// Run one full pipeline attempt, updating the order snapshot as
    /// stages progress: `status` tracks the current stage and the result
    /// fields (`route`, `tx_hash`, `executed_price`, `error`) fill in as
    /// they become known, so the caller holds the terminal snapshot when
    /// this returns.
    ///
    /// Each attempt starts from `pending` regardless of how far an
    /// earlier attempt got; side effects of a partially successful
    /// earlier attempt are not de-duplicated.
    pub async fn run(&self, order: &mut Order) -> Result<SwapReceipt> {
        let order_id = order.order_id;
        match self.run_stages(order).await {
            Ok(receipt) => {
                info!(%order_id, tx_hash = %receipt.tx_hash, "order confirmed");
                Ok(receipt)
            }
            Err(err) => {
                // Error-path emission and persistence are best-effort and
                // must never mask the original failure.
                let message = err.to_string();
                order.status = OrderStatus::Failed;
                order.error = Some(message.clone());
                self.broadcaster
                    .record(order_id, OrderStatus::Failed, json!({ "error": message }));
                self.persist(order_id, OrderStatus::Failed, json!({ "error": message }))
                    .await;
                warn!(%order_id, error = %message, "pipeline attempt failed");
                Err(err)
            }
        }
    }

    async fn run_stages(&self, order: &mut Order) -> Result<SwapReceipt> {
        let order_id = order.order_id;

        // A retry starts clean; results of the previous attempt are
        // discarded.
        order.status = OrderStatus::Pending;
        order.route = None;
        order.tx_hash = None;
        order.executed_price = None;
        order.error = None;
        self.transition(order_id, OrderStatus::Pending, json!({ "stage": "received" }))
            .await;

        order.status = OrderStatus::Routing;
        self.transition(
            order_id,
            OrderStatus::Routing,
            json!({ "stage": "fetching-quotes" }),
        )
        .await;
        let quotes = self.bounded(self.provider.get_quotes(order)).await??;
        let best = best_quote(&quotes)
            .ok_or(SwaplineError::NoQuotesAvailable)?
            .clone();

        order.status = OrderStatus::Building;
        order.route = Some(best.source.clone());
        self.transition(
            order_id,
            OrderStatus::Building,
            json!({ "route": best.source, "quotes": quotes }),
        )
        .await;

        let receipt = self
            .bounded(self.provider.execute_swap(&best.source, order))
            .await??;

        order.status = OrderStatus::Submitted;
        order.tx_hash = Some(receipt.tx_hash.clone());
        self.transition(
            order_id,
            OrderStatus::Submitted,
            json!({ "txHash": receipt.tx_hash }),
        )
        .await;

        order.status = OrderStatus::Confirmed;
        order.executed_price = Some(receipt.executed_price);
        self.transition(
            order_id,
            OrderStatus::Confirmed,
            json!({ "txHash": receipt.tx_hash, "executedPrice": receipt.executed_price }),
        )
        .await;

        Ok(receipt)
    }

    /// Emit the transition event and persist the status snapshot. The
    /// sink call is fire-and-forget for correctness: its failure is a
    /// persistence warning, never an aborted pipeline.
    async fn transition(&self, order_id: Uuid, status: OrderStatus, meta: serde_json::Value) {
        self.broadcaster.record(order_id, status, meta.clone());
        self.persist(order_id, status, meta).await;
    }

    async fn persist(&self, order_id: Uuid, status: OrderStatus, meta: serde_json::Value) {
        if let Err(e) = self.sink.upsert(order_id, status, meta).await {
            warn!(%order_id, %status, "status sink upsert failed: {e}");
        }
    }

    /// Bound a provider call by the configured stage timeout. Provider
    /// calls are the pipeline's only long suspension points; a venue
    /// that never answers must not hold a worker slot forever.
    async fn bounded<F, T>(&self, fut: F) -> Result<Result<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                SwaplineError::StageTimeout {
                    elapsed_ms: limit.as_millis() as u64,
                }
            }),
            None => Ok(fut.await),
        }
    }
}
