pub mod controller;
pub mod state;

pub use controller::{TimingController, DEFAULT_CADENCE_SECS, OBSERVED_INGESTION_SECS};
pub use state::{IterationState, IterationStatus, MOVING_AVERAGE_SIZE};
