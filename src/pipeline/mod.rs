pub mod runner;

pub use runner::OrderPipeline;
