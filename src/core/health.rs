//! # Pool health aggregation.
//!
//! Health is a pure function of how many workers are up, the pool size, the
//! steady-state floor and whether the pool has ever been fully up:
//!
//! ```text
//! initializing:  healthy ⇔ up == worker_count   (first success ends initializing)
//! steady state:  healthy ⇔ up >= min_worker_count
//! ```
//!
//! The gap between the two rules is the hysteresis: a degraded pool
//! only has to hold the floor to be healthy again, not return to full strength.

use crate::worker::ControlMessage;

/// Binary pool health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn is_healthy(self) -> bool {
        matches!(self, Health::Healthy)
    }

    /// Message broadcast to every worker.
    pub fn message(self) -> ControlMessage {
        match self {
            Health::Healthy => ControlMessage::Healthy,
            Health::Unhealthy => ControlMessage::Unhealthy,
        }
    }
}

/// Tracks the `initializing` flag and evaluates the health rules.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    worker_count: usize,
    min_worker_count: usize,
    initializing: bool,
}

impl HealthTracker {
    pub fn new(worker_count: usize, min_worker_count: usize) -> Self {
        Self {
            worker_count,
            min_worker_count,
            initializing: true,
        }
    }

    /// True until the pool first reaches full health.
    pub fn initializing(&self) -> bool {
        self.initializing
    }

    /// Recomputes health for `workers_up`. Clears `initializing` on the first full pool.
    pub fn recompute(&mut self, workers_up: usize) -> Health {
        let healthy = if self.initializing {
            workers_up == self.worker_count
        } else {
            workers_up >= self.min_worker_count
        };
        if healthy {
            self.initializing = false;
            Health::Healthy
        } else {
            Health::Unhealthy
        }
    }
}
