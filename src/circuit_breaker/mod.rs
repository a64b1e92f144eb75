pub mod breaker;
pub mod types;

pub use breaker::CircuitBreaker;
pub use types::{BreakerError, CircuitBreakerConfig, CircuitState};
