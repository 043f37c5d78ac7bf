//! Wall-clock budget for one decomposition.

use std::time::{Duration, Instant};

use crate::error::DecomposeError;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.budget
    }

    /// `Err(Timeout)` once the budget is spent.
    pub fn check(&self, exported: usize) -> Result<(), DecomposeError> {
        let elapsed = self.elapsed();
        if elapsed > self.budget {
            return Err(DecomposeError::Timeout {
                elapsed,
                budget: self.budget,
                exported,
            });
        }
        Ok(())
    }
}
