pub mod status_sink;

pub use status_sink::{MemoryStatusSink, PostgresStatusSink, StatusSink};
