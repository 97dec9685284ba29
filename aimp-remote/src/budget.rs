//! Per-session error budget
//!
//! Failures that happen close together are counted; a quiet period longer
//! than the reset window starts the count over. Reaching the threshold means
//! the session should be torn down.

use std::time::{Duration, Instant};

/// Threshold and reset window of an [`ErrorBudget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudgetConfig {
    /// Number of failures within the window that exhausts the budget
    /// Default: 10
    pub threshold: u32,

    /// Gap between failures after which the count restarts
    /// Default: 60 seconds
    pub reset_window: Duration,
}

impl Default for ErrorBudgetConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            reset_window: Duration::from_secs(60),
        }
    }
}

/// Outcome of recording one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    /// The failure was counted and the session can carry on
    Absorbed { count: u32 },
    /// The threshold was reached
    Exhausted { count: u32 },
}

#[derive(Debug)]
pub struct ErrorBudget {
    config: ErrorBudgetConfig,
    count: u32,
    last_error: Option<Instant>,
}

impl ErrorBudget {
    pub fn new(config: ErrorBudgetConfig) -> Self {
        Self {
            config,
            count: 0,
            last_error: None,
        }
    }

    pub fn record(&mut self) -> BudgetVerdict {
        self.record_at(Instant::now())
    }

    pub fn record_at(&mut self, now: Instant) -> BudgetVerdict {
        let within_window = self
            .last_error
            .map(|last| now.saturating_duration_since(last) < self.config.reset_window)
            .unwrap_or(false);

        if within_window {
            self.count += 1;
        } else {
            self.count = 1;
        }
        if self.count >= self.config.threshold {
            return BudgetVerdict::Exhausted { count: self.count };
        }

        self.last_error = Some(now);
        BudgetVerdict::Absorbed { count: self.count }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn config(&self) -> ErrorBudgetConfig {
        self.config
    }
}
