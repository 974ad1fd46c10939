//! Sampling side of the agent: the sensors, sample assembly, the collection
//! loop and the supervisor that runs it next to the browser return worker.

pub mod capture;
pub mod collector;
pub mod controller;
pub mod screenshot;
pub mod telemetry;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    error::StoreError,
    models::{FeedbackSample, IamSession, TelemetrySnapshot},
};

pub use capture::FeedbackCapture;
pub use collector::Collector;
pub use controller::SensingController;
pub use screenshot::CommandScreenshotter;
pub use telemetry::PersonalAnalyticsClient;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn snapshot(&self) -> Result<TelemetrySnapshot>;
}

#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    /// Path of a freshly written image.
    async fn capture(&self) -> Result<PathBuf>;
}

/// Where samples are kept locally after the upload attempt.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn insert(&self, sample: &FeedbackSample, session: &IamSession) -> Result<(), StoreError>;
}
