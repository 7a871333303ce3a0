//! Resilience primitives for calls to external dependencies.
//!
//! Three composable building blocks and one composition:
//! - [`with_timeout`] races an operation against a deadline
//! - [`RetryPolicy`] re-invokes a failing operation with exponential
//!   backoff plus jitter
//! - [`CircuitBreaker`] isolates a failing dependency behind a
//!   closed/open/half-open gate
//! - [`ResilienceExecutor`] wraps a single operation in all three,
//!   breaker outermost, with metrics and an optional fallback for an
//!   open circuit

pub mod breaker;
pub mod error;
pub mod executor;
pub mod retry;
pub mod timeout;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::ResilienceError;
pub use executor::ResilienceExecutor;
pub use retry::RetryPolicy;
pub use timeout::with_timeout;
