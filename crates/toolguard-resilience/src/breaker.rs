//! Circuit breaker for calls to an unreliable remote policy service.
//!
//! Three states: `Closed` (calls go through), `Open` (calls are rejected
//! without attempting the remote call), `HalfOpen` (a bounded number of
//! probe calls are allowed through to test recovery). Failures accumulate
//! in `Closed`; `failure_threshold` consecutive failures trip the breaker
//! to `Open` for `open_duration`, after which up to
//! `half_open_max_attempts` concurrent probes are let through. The first
//! recorded success closes the breaker; the first recorded failure
//! reopens it.

use crate::clock::Clock;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BreakerError {
    #[error("circuit breaker is open, rejecting call without attempting it")]
    Open,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_attempts: u32,
}

pub struct CircuitBreaker {
    clock: Box<dyn Clock>,
    failure_threshold: u32,
    open_duration: Duration,
    half_open_max_attempts: u32,
    inner: Mutex<Inner>,
}

/// A permit to attempt a call, returned by [`CircuitBreaker::begin_attempt`].
/// Must be resolved with [`CircuitBreaker::record_success`] or
/// [`CircuitBreaker::record_failure`].
pub struct Attempt {
    was_probe: bool,
}

impl CircuitBreaker {
    pub fn new(clock: Box<dyn Clock>, failure_threshold: u32, open_duration: Duration) -> Self {
        Self::with_half_open_attempts(clock, failure_threshold, open_duration, 1)
    }

    pub fn with_half_open_attempts(
        clock: Box<dyn Clock>,
        failure_threshold: u32,
        open_duration: Duration,
        half_open_max_attempts: u32,
    ) -> Self {
        Self {
            clock,
            failure_threshold,
            open_duration,
            half_open_max_attempts: half_open_max_attempts.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_attempts: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Ask permission to attempt a call. In `Closed`, always grants it. In
    /// `Open`, grants probes once `open_duration` has elapsed, transitioning
    /// to `HalfOpen` and counting up to `half_open_max_attempts` concurrent
    /// probes; otherwise rejects. In `HalfOpen`, rejects once the probe
    /// budget is exhausted.
    pub fn begin_attempt(&self) -> Result<Attempt, BreakerError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => Ok(Attempt { was_probe: false }),
            BreakerState::HalfOpen => {
                if inner.half_open_attempts < self.half_open_max_attempts {
                    inner.half_open_attempts += 1;
                    Ok(Attempt { was_probe: true })
                } else {
                    Err(BreakerError::Open)
                }
            }
            BreakerState::Open => {
                let opened_at = inner.opened_at.expect("open state always has opened_at");
                if self.clock.now().duration_since(opened_at) >= self.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_attempts = 1;
                    Ok(Attempt { was_probe: true })
                } else {
                    Err(BreakerError::Open)
                }
            }
        }
    }

    pub fn record_success(&self, attempt: Attempt) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_attempts = 0;
        inner.state = BreakerState::Closed;
        let _ = attempt.was_probe;
    }

    pub fn record_failure(&self, attempt: Attempt) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if attempt.was_probe {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(self.clock.now());
            inner.half_open_attempts = 0;
            return;
        }
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(self.clock.now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    #[test]
    fn trips_open_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(Box::new(MockClock::new()), 3, Duration::from_secs(30));
        for _ in 0..3 {
            let attempt = breaker.begin_attempt().unwrap();
            breaker.record_failure(attempt);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(breaker.begin_attempt(), Err(BreakerError::Open)));
    }

    #[test]
    fn half_open_probe_closes_breaker_on_success() {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::new(Box::new(clock.clone()), 1, Duration::from_secs(10));
        let attempt = breaker.begin_attempt().unwrap();
        breaker.record_failure(attempt);
        assert_eq!(breaker.state(), BreakerState::Open);

        clock.advance(Duration::from_secs(11));
        let probe = breaker.begin_attempt().expect("probe should be allowed");
        breaker.record_success(probe);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn failed_probe_reopens_the_breaker() {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::new(Box::new(clock.clone()), 1, Duration::from_secs(10));
        let attempt = breaker.begin_attempt().unwrap();
        breaker.record_failure(attempt);

        clock.advance(Duration::from_secs(11));
        let probe = breaker.begin_attempt().unwrap();
        breaker.record_failure(probe);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new(Box::new(MockClock::new()), 3, Duration::from_secs(30));
        let a1 = breaker.begin_attempt().unwrap();
        breaker.record_failure(a1);
        let a2 = breaker.begin_attempt().unwrap();
        breaker.record_success(a2);
        let a3 = breaker.begin_attempt().unwrap();
        breaker.record_failure(a3);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_allows_up_to_configured_concurrent_probes() {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::with_half_open_attempts(
            Box::new(clock.clone()),
            1,
            Duration::from_secs(10),
            2,
        );
        let attempt = breaker.begin_attempt().unwrap();
        breaker.record_failure(attempt);
        clock.advance(Duration::from_secs(11));

        let probe1 = breaker.begin_attempt().expect("first probe allowed");
        let probe2 = breaker.begin_attempt().expect("second probe allowed");
        assert!(matches!(breaker.begin_attempt(), Err(BreakerError::Open)));
        breaker.record_failure(probe1);
        breaker.record_success(probe2);
    }
}
