// src/guardrail.rs
// Wall-clock and budget guardrails for a single generation run.

use std::time::{Duration, Instant};

use crate::error::RalphError;

/// Tracks elapsed time and the cost ceiling for one run. Constructed at the
/// top of the loop; both checks are pure reads afterwards.
#[derive(Debug)]
pub struct RunGuardrail {
    started: Instant,
    timeout: Duration,
    cost_limit_cents: u32,
}

impl RunGuardrail {
    pub fn new(timeout_minutes: u64, cost_limit_cents: u32) -> Result<Self, RalphError> {
        if timeout_minutes == 0 {
            return Err(RalphError::Config(
                "timeout_minutes must be greater than 0".into(),
            ));
        }
        Ok(Self {
            started: Instant::now(),
            timeout: Duration::from_secs(timeout_minutes * 60),
            cost_limit_cents,
        })
    }

    /// True once the configured timeout has been reached.
    pub fn timeout_exceeded(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    /// True when the running total is strictly over the limit.
    pub fn cost_exceeded(&self, current_cost_cents: u32) -> bool {
        current_cost_cents > self.cost_limit_cents
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_timeout() {
        assert!(RunGuardrail::new(0, 100).is_err());
    }

    #[test]
    fn fresh_guardrail_has_not_timed_out() {
        let g = RunGuardrail::new(30, 100).unwrap();
        assert!(!g.timeout_exceeded());
    }

    #[test]
    fn cost_check_is_strictly_greater_than() {
        let g = RunGuardrail::new(30, 100).unwrap();
        assert!(!g.cost_exceeded(0));
        assert!(!g.cost_exceeded(100), "at the limit is still within budget");
        assert!(g.cost_exceeded(101));
    }

    #[test]
    fn zero_cost_limit_trips_on_first_cent() {
        let g = RunGuardrail::new(1, 0).unwrap();
        assert!(!g.cost_exceeded(0));
        assert!(g.cost_exceeded(1));
    }
}
