//! Per-tool sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    max_calls: usize,
    calls: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            window,
            max_calls,
            calls: HashMap::new(),
        }
    }

    /// Record a call attempt for `tool_name` at `now`, evicting timestamps
    /// that have fallen outside the window, and report whether the call is
    /// within the allowed rate.
    pub fn check_and_record(&mut self, tool_name: &str, now: Instant) -> bool {
        let entry = self.calls.entry(tool_name.to_string()).or_default();
        while let Some(&front) = entry.front() {
            if now.duration_since(front) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() >= self.max_calls {
            return false;
        }
        entry.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_denies() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_and_record("charge", now));
        assert!(limiter.check_and_record("charge", now));
        assert!(!limiter.check_and_record("charge", now));
    }

    #[test]
    fn window_slides_calls_back_in() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(10));
        let t0 = Instant::now();
        assert!(limiter.check_and_record("charge", t0));
        assert!(!limiter.check_and_record("charge", t0));
        let later = t0 + Duration::from_millis(20);
        assert!(limiter.check_and_record("charge", later));
    }

    #[test]
    fn tools_are_tracked_independently() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_and_record("charge", now));
        assert!(limiter.check_and_record("refund", now));
    }
}
