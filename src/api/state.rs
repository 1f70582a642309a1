use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::events::Broadcaster;
use crate::queue::JobQueue;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Order intake queue
    pub queue: Arc<JobQueue>,

    /// Event log and live-progress broadcaster
    pub broadcaster: Arc<Broadcaster>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(queue: Arc<JobQueue>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            queue,
            broadcaster,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
