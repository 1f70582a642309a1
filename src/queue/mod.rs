pub mod store;
pub mod worker;

pub use store::{JobRecord, JobState, JobStore, MemoryJobStore, PostgresJobStore};
pub use worker::JobQueue;
