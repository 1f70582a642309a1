//! Durable record of submitted jobs.
//!
//! A successful insert is the queue's intake guarantee: the job will be
//! attempted at least once barring total queue-storage loss. Terminal
//! outcomes are written back for audit and intake-recovery inspection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Order;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// One durable queue entry wrapping an order snapshot. Inserted with the
/// enqueue-time snapshot; terminal marks replace it with the final one,
/// result fields included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub order: Order,
    pub state: JobState,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Durably record a new job. Failure here is fatal for intake.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Mark the job terminally completed after `attempts` pipeline runs,
    /// storing the confirmed order snapshot.
    async fn mark_completed(&self, order: &Order, attempts: u32) -> Result<()>;

    /// Mark the job permanently failed after exhausting its attempts,
    /// storing the failed order snapshot.
    async fn mark_failed(&self, order: &Order, attempts: u32, error: &str) -> Result<()>;

    /// Jobs recorded but not yet terminal, oldest first.
    async fn pending_jobs(&self) -> Result<Vec<JobRecord>>;
}

/// In-memory store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
    /// Simulates queue-storage loss when set; `insert` then fails.
    reject_inserts: std::sync::atomic::AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_inserts(&self, reject: bool) {
        self.reject_inserts
            .store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn job(&self, order_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        if self.reject_inserts.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::SwaplineError::Internal(
                "job storage unavailable".into(),
            ));
        }
        self.jobs.write().await.insert(
            order.order_id,
            JobRecord {
                order: order.clone(),
                state: JobState::Pending,
                attempts: 0,
                error: None,
                enqueued_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mark_completed(&self, order: &Order, attempts: u32) -> Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(&order.order_id) {
            job.order = order.clone();
            job.state = JobState::Completed;
            job.attempts = attempts;
        }
        Ok(())
    }

    async fn mark_failed(&self, order: &Order, attempts: u32, error: &str) -> Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(&order.order_id) {
            job.order = order.clone();
            job.state = JobState::Failed;
            job.attempts = attempts;
            job.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn pending_jobs(&self) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.read().await;
        let mut pending: Vec<JobRecord> = jobs
            .values()
            .filter(|j| j.state == JobState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.enqueued_at);
        Ok(pending)
    }
}

/// Postgres-backed job store.
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                order_id UUID PRIMARY KEY,
                payload JSONB NOT NULL,
                state TEXT NOT NULL DEFAULT 'pending',
                attempts INT NOT NULL DEFAULT 0,
                error TEXT,
                enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
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
impl JobStore for PostgresJobStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (order_id, payload, state)
            VALUES ($1, $2, 'pending')
            ON CONFLICT (order_id) DO
              UPDATE SET state = 'pending', updated_at = now()
            "#,
        )
        .bind(order.order_id)
        .bind(serde_json::to_value(order)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, order: &Order, attempts: u32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET payload = $2, state = 'completed', attempts = $3, updated_at = now()
            WHERE order_id = $1
            "#,
        )
        .bind(order.order_id)
        .bind(serde_json::to_value(order)?)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, order: &Order, attempts: u32, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET payload = $2, state = 'failed', attempts = $3, error = $4, updated_at = now()
            WHERE order_id = $1
            "#,
        )
        .bind(order.order_id)
        .bind(serde_json::to_value(order)?)
        .bind(attempts as i32)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT payload, attempts, error, enqueued_at
            FROM jobs
            WHERE state = 'pending'
            ORDER BY enqueued_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            let attempts: i32 = row.get("attempts");
            jobs.push(JobRecord {
                order: serde_json::from_value(payload)?,
                state: JobState::Pending,
                attempts: attempts as u32,
                error: row.get("error"),
                enqueued_at: row.get("enqueued_at"),
            });
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, SubmitOrderRequest};
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(SubmitOrderRequest {
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount: dec!(1),
            slippage: None,
        })
    }

    #[tokio::test]
    async fn pending_jobs_excludes_terminal_states() {
        let store = MemoryJobStore::new();
        let done = order();
        let failed = order();
        let waiting = order();
        for o in [&done, &failed, &waiting] {
            store.insert(o).await.expect("insert");
        }
        store.mark_completed(&done, 1).await.expect("mark");
        store
            .mark_failed(&failed, 3, "venue down")
            .await
            .expect("mark");

        let pending = store.pending_jobs().await.expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order.order_id, waiting.order_id);

        let failed_job = store.job(failed.order_id).await.expect("job");
        assert_eq!(failed_job.state, JobState::Failed);
        assert_eq!(failed_job.attempts, 3);
        assert_eq!(failed_job.error.as_deref(), Some("venue down"));
    }

    #[tokio::test]
    async fn terminal_mark_replaces_the_stored_snapshot() {
        let store = MemoryJobStore::new();
        let mut o = order();
        store.insert(&o).await.expect("insert");

        o.status = OrderStatus::Confirmed;
        o.route = Some("meteora".into());
        o.tx_hash = Some("mocktx_done000000".into());
        store.mark_completed(&o, 1).await.expect("mark");

        let job = store.job(o.order_id).await.expect("job");
        assert_eq!(job.order.status, OrderStatus::Confirmed);
        assert_eq!(job.order.route.as_deref(), Some("meteora"));
        assert_eq!(job.order.tx_hash.as_deref(), Some("mocktx_done000000"));
    }

    #[tokio::test]
    async fn rejecting_store_fails_inserts() {
        let store = MemoryJobStore::new();
        store.reject_inserts(true);
        assert!(store.insert(&order()).await.is_err());
    }
}
