use async_trait::async_trait;

use crate::domain::{Order, Quote, SwapReceipt};
use crate::error::Result;

/// Quote-sourcing and swap-execution capability.
///
/// Pure capability, no state: implementations must be safe to share
/// across concurrent pipeline workers. Both calls are the pipeline's
/// only expected suspension points and may block for network- or
/// settlement-latency-bound time; failures propagate as pipeline
/// failures and are the queue's to retry.
#[async_trait]
pub trait DexProvider: Send + Sync {
    /// Fetch competing quotes for the order. An empty result set is a
    /// valid response; the pipeline treats it as `NoQuotesAvailable`.
    async fn get_quotes(&self, order: &Order) -> Result<Vec<Quote>>;

    /// Execute the swap on the chosen venue.
    async fn execute_swap(&self, venue: &str, order: &Order) -> Result<SwapReceipt>;
}
