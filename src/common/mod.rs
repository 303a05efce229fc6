//! Request guards shared by exchange clients
//!
//! - `circuit_breaker`: stop hammering a venue that keeps failing
//! - `throttle`: minimum spacing between outgoing requests

pub mod circuit_breaker;
pub mod throttle;

pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use throttle::Throttle;
