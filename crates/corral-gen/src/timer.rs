//! Cooperative wall-clock deadline.

use std::time::{Duration, Instant};

/// Monotonic deadline polled at defined probe points. There is no
/// interrupt mechanism; cancellation is cooperative.
#[derive(Debug)]
pub struct Timer {
    deadline: Instant,
}

impl Timer {
    pub fn new(budget: Duration) -> Self {
        Timer {
            deadline: Instant::now() + budget,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Whether less than `margin` of the budget remains.
    pub fn is_almost_expired(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.deadline
    }
}
