use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A candidate price/venue offer for executing a swap. Ephemeral:
/// produced by the provider, consumed once per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Venue label, e.g. "raydium"
    pub source: String,
    pub price: Decimal,
    pub fee: Decimal,
}

/// Settlement result of an executed swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub executed_price: Decimal,
}

/// Deterministic route selection: lowest price wins. Fees are not
/// factored in, which under-optimizes net cost; that is the router's
/// documented selection rule and callers must not "fix" it here.
pub fn best_quote(quotes: &[Quote]) -> Option<&Quote> {
    quotes.iter().reduce(|a, b| if b.price < a.price { b } else { a })
}
