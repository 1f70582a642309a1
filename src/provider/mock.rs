use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::domain::{Order, Quote, SwapReceipt};
use crate::error::Result;

const BASE_PRICE: f64 = 100.0;

/// Simulated DEX aggregator: two venues with jittered prices around a
/// fixed base, and a slow settlement leg. Latencies come from config so
/// tests can run with them zeroed.
pub struct MockDexRouter {
    quote_latency: Duration,
    swap_latency: Duration,
}

impl MockDexRouter {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            quote_latency: Duration::from_millis(config.quote_latency_ms),
            swap_latency: Duration::from_millis(config.swap_latency_ms),
        }
    }

    fn price(factor: f64) -> Decimal {
        Decimal::from_f64(BASE_PRICE * factor).unwrap_or(Decimal::ONE_HUNDRED)
    }
}

impl Default for MockDexRouter {
    fn default() -> Self {
        Self::new(&ProviderConfig::default())
    }
}

#[async_trait]
impl crate::provider::DexProvider for MockDexRouter {
    async fn get_quotes(&self, order: &Order) -> Result<Vec<Quote>> {
        tokio::time::sleep(self.quote_latency).await;
        let (raydium_jitter, meteora_jitter) = {
            let mut rng = rand::thread_rng();
            (
                0.98 + rng.gen::<f64>() * 0.04,
                0.97 + rng.gen::<f64>() * 0.05,
            )
        };
        let quotes = vec![
            Quote {
                source: "raydium".to_string(),
                price: Self::price(raydium_jitter),
                fee: Decimal::new(3, 3),
            },
            Quote {
                source: "meteora".to_string(),
                price: Self::price(meteora_jitter),
                fee: Decimal::new(2, 3),
            },
        ];
        debug!(order_id = %order.order_id, quotes = quotes.len(), "mock quotes generated");
        Ok(quotes)
    }

    async fn execute_swap(&self, venue: &str, order: &Order) -> Result<SwapReceipt> {
        // Settlement takes 1x-1.5x the configured latency.
        let jitter_ms = {
            let mut rng = rand::thread_rng();
            (self.swap_latency.as_millis() as f64 * rng.gen::<f64>() * 0.5) as u64
        };
        tokio::time::sleep(self.swap_latency + Duration::from_millis(jitter_ms)).await;

        let (suffix, price_factor) = {
            let mut rng = rand::thread_rng();
            let suffix: String = (0..10)
                .map(|_| {
                    let chars = b"abcdefghijklmnopqrstuvwxyz0123456789";
                    chars[rng.gen_range(0..chars.len())] as char
                })
                .collect();
            (suffix, 0.95 + rng.gen::<f64>() * 0.1)
        };

        let receipt = SwapReceipt {
            tx_hash: format!("mocktx_{suffix}"),
            executed_price: Self::price(price_factor),
        };
        debug!(order_id = %order.order_id, %venue, tx_hash = %receipt.tx_hash, "mock swap executed");
        Ok(receipt)
    }
}
