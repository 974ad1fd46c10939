use std::time::Duration;

use tokio::time::{self, Instant};

use crate::error::TimingError;

use super::IterationState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Wall-clock period the backend expects between two samples.
pub const SAMPLE_PERIOD_SECS: u64 = 30;
/// Typical round trip of one feedback upload, measured against the production backend.
pub const OBSERVED_INGESTION_SECS: u64 = 4;
pub const DEFAULT_CADENCE_SECS: u64 = SAMPLE_PERIOD_SECS - OBSERVED_INGESTION_SECS;

/// Keeps the sampling frequency constant by subtracting the recent average
/// iteration overhead from the nominal period.
///
/// `start_iteration` / `finish_iteration` must strictly alternate.
#[derive(Debug, Clone)]
pub struct TimingController {
    state: IterationState,
    cadence_secs: u64,
}

impl Default for TimingController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingController {
    pub fn new() -> Self {
        Self {
            state: IterationState::new(),
            cadence_secs: DEFAULT_CADENCE_SECS,
        }
    }

    pub fn with_cadence(cadence_secs: u64) -> Self {
        Self {
            state: IterationState::new(),
            cadence_secs,
        }
    }

    pub fn set_time(&mut self, seconds: i64) -> Result<(), TimingError> {
        let cadence = u64::try_from(seconds).map_err(|_| {
            TimingError::InvalidArgument(format!("time to wait cannot be negative, got {seconds}"))
        })?;
        self.cadence_secs = cadence;
        Ok(())
    }

    pub fn cadence_secs(&self) -> u64 {
        self.cadence_secs
    }

    pub fn start_iteration(&mut self) -> Result<(), TimingError> {
        self.state.begin(Instant::now())
    }

    pub fn finish_iteration(&mut self) -> Result<(), TimingError> {
        let elapsed = self.state.finish(Instant::now())?;
        log_debug!("iteration took {elapsed}s");
        Ok(())
    }

    pub fn is_tracking_iteration(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Nominal cadence until the history window is full, then cadence minus
    /// the moving average. May be negative.
    pub fn compute_time_to_wait(&self) -> f64 {
        let cadence = self.cadence_secs as f64;
        match self.state.moving_average() {
            Some(average) => cadence - average,
            None => cadence,
        }
    }

    pub async fn wait(&self) {
        let time_to_wait = self.compute_time_to_wait();
        log_debug!("waiting {time_to_wait:.1}s before next sample");
        if time_to_wait > 0.0 {
            time::sleep(Duration::from_secs_f64(time_to_wait)).await;
        }
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut IterationState {
        &mut self.state
    }
}
