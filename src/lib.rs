pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod persistence;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod validation;

pub use config::AppConfig;
pub use domain::{Order, OrderEvent, OrderStatus, Quote, SubmitOrderRequest, SwapReceipt};
pub use error::{Result, SwaplineError};
pub use events::Broadcaster;
pub use persistence::{MemoryStatusSink, PostgresStatusSink, StatusSink};
pub use pipeline::OrderPipeline;
pub use provider::{DexProvider, MockDexRouter};
pub use queue::{JobQueue, JobRecord, JobState, JobStore, MemoryJobStore, PostgresJobStore};
