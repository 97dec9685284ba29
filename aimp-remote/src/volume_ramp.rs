//! Press-and-hold volume control
//!
//! While a ramp is held the volume moves in growing steps: 1, 3, 6, 8, 11,
//! and so on, one step every 250 ms.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Delay between two ramp steps
pub const RAMP_STEP_INTERVAL: Duration = Duration::from_millis(250);

const INITIAL_FACTOR: f64 = 1.1;
const FACTOR_INCREMENT: f64 = 2.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
}

/// Sequence of signed volume deltas for one held press
#[derive(Debug, Clone)]
pub struct VolumeRamp {
    direction: RampDirection,
    factor: f64,
}

impl VolumeRamp {
    pub fn new(direction: RampDirection) -> Self {
        Self {
            direction,
            factor: INITIAL_FACTOR,
        }
    }

    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    /// Next delta to apply; grows with every call
    pub fn next_step(&mut self) -> i32 {
        let magnitude = self.factor as i32;
        self.factor += FACTOR_INCREMENT;
        match self.direction {
            RampDirection::Up => magnitude,
            RampDirection::Down => -magnitude,
        }
    }
}

impl Iterator for VolumeRamp {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        Some(self.next_step())
    }
}

/// A running ramp; stops on [`stop`](Self::stop) or when dropped
#[derive(Debug)]
pub struct VolumeRampHandle {
    direction: RampDirection,
    task: JoinHandle<()>,
}

impl VolumeRampHandle {
    pub(crate) fn new(direction: RampDirection, task: JoinHandle<()>) -> Self {
        Self { direction, task }
    }

    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    pub fn stop(self) {}
}

impl Drop for VolumeRampHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
