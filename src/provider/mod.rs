pub mod mock;
pub mod traits;

pub use mock::MockDexRouter;
pub use traits::DexProvider;
