pub mod health;
pub mod orders;

pub use health::get_health;
pub use orders::execute_order;
