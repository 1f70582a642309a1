//! Durable last-known-status store.
//!
//! Consulted for audit and recovery, never for pipeline correctness.
//! Writes are idempotent last-write-wins per order; under concurrent
//! retries of the same order each attempt's writes race independently,
//! so the sink is eventually consistent per order and callers must not
//! rely on write ordering relative to broadcaster events.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::OrderStatus;
use crate::error::Result;

#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Upsert the order's last-known status and metadata.
    async fn upsert(&self, order_id: Uuid, status: OrderStatus, meta: serde_json::Value)
        -> Result<()>;
}

/// Postgres-backed sink mirroring the `orders` audit table.
pub struct PostgresStatusSink {
    pool: PgPool,
}

impl PostgresStatusSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the audit table if missing.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_id UUID PRIMARY KEY,
                status TEXT NOT NULL,
                meta JSONB,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatusSink for PostgresStatusSink {
    async fn upsert(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        meta: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, status, meta, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (order_id) DO
              UPDATE SET status = $2, meta = $3, updated_at = now()
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(&meta)
        .execute(&self.pool)
        .await?;
        debug!(%order_id, %status, "status snapshot persisted");
        Ok(())
    }
}

/// In-memory sink for tests and database-less runs.
#[derive(Default)]
pub struct MemoryStatusSink {
    entries: RwLock<HashMap<Uuid, (OrderStatus, serde_json::Value)>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status_of(&self, order_id: Uuid) -> Option<OrderStatus> {
        self.entries.read().await.get(&order_id).map(|(s, _)| *s)
    }

    pub async fn meta_of(&self, order_id: Uuid) -> Option<serde_json::Value> {
        self.entries
            .read()
            .await
            .get(&order_id)
            .map(|(_, m)| m.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StatusSink for MemoryStatusSink {
    async fn upsert(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        meta: serde_json::Value,
    ) -> Result<()> {
        self.entries.write().await.insert(order_id, (status, meta));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_sink_is_last_write_wins() {
        let sink = MemoryStatusSink::new();
        let id = Uuid::new_v4();
        sink.upsert(id, OrderStatus::Pending, json!({"stage": "received"}))
            .await
            .expect("upsert");
        sink.upsert(id, OrderStatus::Confirmed, json!({"txHash": "mocktx_x"}))
            .await
            .expect("upsert");

        assert_eq!(sink.status_of(id).await, Some(OrderStatus::Confirmed));
        assert_eq!(sink.len().await, 1);
        assert_eq!(
            sink.meta_of(id).await.expect("meta")["txHash"],
            json!("mocktx_x")
        );
    }
}
