//! Resilience primitives for calling out to a remote policy service:
//! circuit breaker, jittered retry, and a client that combines both with
//! fail-open/fail-closed synthesis when the remote service is down.

mod breaker;
mod clock;
mod client;
mod retry;

pub use breaker::{Attempt, BreakerError, BreakerState, CircuitBreaker};
pub use clock::{Clock, MockClock, SystemClock};
pub use client::{PolicyRequest, RawDecision, RemotePolicyClient, RemotePolicyError};
pub use retry::{retry_with_jitter, RetryPolicy};
