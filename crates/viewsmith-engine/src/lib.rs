pub mod pool;
pub mod sandbox;

pub use pool::EnginePool;
pub use sandbox::{EngineError, EngineLimits};
