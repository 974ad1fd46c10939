use std::collections::VecDeque;

use tokio::time::Instant;

use crate::error::TimingError;

/// Number of recent iterations averaged when correcting the cadence.
pub const MOVING_AVERAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationStatus {
    #[default]
    Idle,
    Tracking,
}

#[derive(Debug, Clone, Default)]
pub struct IterationState {
    pub status: IterationStatus,
    pub started_at: Option<Instant>,
    /// Whole-second durations of the most recent iterations, oldest first.
    history: VecDeque<u64>,
}

impl IterationState {
    pub fn new() -> Self {
        Self {
            status: IterationStatus::Idle,
            started_at: None,
            history: VecDeque::with_capacity(MOVING_AVERAGE_SIZE),
        }
    }

    pub fn begin(&mut self, now: Instant) -> Result<(), TimingError> {
        if self.status == IterationStatus::Tracking {
            return Err(TimingError::IllegalState(
                "there is already an iteration being tracked",
            ));
        }
        self.started_at = Some(now);
        self.status = IterationStatus::Tracking;
        Ok(())
    }

    /// Closes the current iteration and returns its truncated duration in seconds.
    pub fn finish(&mut self, now: Instant) -> Result<u64, TimingError> {
        let started_at = match (self.status, self.started_at) {
            (IterationStatus::Tracking, Some(started_at)) => started_at,
            _ => {
                return Err(TimingError::IllegalState(
                    "there is not any iteration being tracked",
                ))
            }
        };

        let elapsed = now.saturating_duration_since(started_at).as_secs();
        self.record(elapsed);

        self.started_at = None;
        self.status = IterationStatus::Idle;
        Ok(elapsed)
    }

    pub fn record(&mut self, elapsed_secs: u64) {
        if self.history.len() == MOVING_AVERAGE_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(elapsed_secs);
    }

    pub fn history(&self) -> &VecDeque<u64> {
        &self.history
    }

    /// Mean of the history, only once it is full.
    pub fn moving_average(&self) -> Option<f64> {
        if self.history.len() < MOVING_AVERAGE_SIZE {
            return None;
        }
        let total: u64 = self.history.iter().sum();
        Some(total as f64 / self.history.len() as f64)
    }

    pub fn is_tracking(&self) -> bool {
        self.status == IterationStatus::Tracking
    }
}
