pub mod event;
pub mod order;
pub mod quote;

pub use event::OrderEvent;
pub use order::{Order, OrderStatus, SubmitOrderRequest};
pub use quote::{best_quote, Quote, SwapReceipt};
