use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::{FeedbackSample, IamSession};

use super::{ScreenshotSource, TelemetrySource};

/// Last number handed out per (username, session_num).
#[derive(Debug, Default)]
struct Sequence {
    last: HashMap<(String, Option<u32>), u32>,
}

impl Sequence {
    /// Starts at 1 for a login seen for the first time and carries on where
    /// it left off when the same login comes back.
    fn next(&mut self, session: &IamSession) -> u32 {
        let owner = (session.username().to_string(), session.session_num);
        let last = self.last.entry(owner).or_insert(0);
        *last += 1;
        *last
    }
}

/// Assembles one feedback sample from the telemetry sensor and a screenshot.
pub struct FeedbackCapture {
    telemetry: Arc<dyn TelemetrySource>,
    screenshots: Arc<dyn ScreenshotSource>,
    sequence: Mutex<Sequence>,
}

impl FeedbackCapture {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, screenshots: Arc<dyn ScreenshotSource>) -> Self {
        Self {
            telemetry,
            screenshots,
            sequence: Mutex::new(Sequence::default()),
        }
    }

    /// A sequence number is only consumed when both sensors succeed.
    pub async fn capture(&self, session: &IamSession) -> Result<FeedbackSample> {
        let telemetry = self
            .telemetry
            .snapshot()
            .await
            .context("telemetry snapshot failed")?;
        let screenshot = self
            .screenshots
            .capture()
            .await
            .context("screenshot capture failed")?;

        let seqnum = {
            let mut sequence = match self.sequence.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            sequence.next(session)
        };

        Ok(FeedbackSample {
            seqnum,
            captured_at: Utc::now(),
            telemetry,
            screenshot,
        })
    }

    /// Deletes the sample's screenshot. Never called by the collection loop.
    pub async fn discard(&self, sample: &FeedbackSample) -> Result<()> {
        tokio::fs::remove_file(&sample.screenshot)
            .await
            .with_context(|| format!("failed to remove {}", sample.screenshot.display()))
    }
}
