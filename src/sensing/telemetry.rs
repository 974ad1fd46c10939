use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{
    feedback::{focus_flag, whole_count},
    TelemetrySnapshot,
};

use super::TelemetrySource;

const SENSOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Payload of the personal-analytics sensor's `/intervention_status`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterventionStatus {
    #[serde(deserialize_with = "focus_flag::deserialize")]
    pub is_focused: bool,
    #[serde(deserialize_with = "whole_count::deserialize")]
    pub click_total: u64,
    #[serde(deserialize_with = "whole_count::deserialize")]
    pub key_total: u64,
    pub moved_distance: f64,
    pub scroll_delta: f64,
}

impl From<InterventionStatus> for TelemetrySnapshot {
    fn from(status: InterventionStatus) -> Self {
        TelemetrySnapshot {
            is_focused: status.is_focused,
            num_mouse_clicks: status.click_total,
            mouse_scroll_distance: status.scroll_delta,
            mouse_move_distance: status.moved_distance,
            keyboard_strokes: status.key_total,
        }
    }
}

/// Client for the personal-analytics tracker running next to the agent.
#[derive(Clone)]
pub struct PersonalAnalyticsClient {
    http: reqwest::Client,
    base_url: String,
}

impl PersonalAnalyticsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SENSOR_TIMEOUT)
            .build()
            .context("failed to build personal analytics client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn status(&self) -> Result<InterventionStatus> {
        let url = format!("{}/intervention_status", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("personal analytics unreachable at {url}"))?
            .error_for_status()
            .context("personal analytics returned an error status")?
            .json::<InterventionStatus>()
            .await
            .context("personal analytics returned an unexpected payload")
    }

    /// Reachability check. Never fails.
    pub async fn check(&self) -> bool {
        let url = format!("{}/intervention_status", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TelemetrySource for PersonalAnalyticsClient {
    async fn snapshot(&self) -> Result<TelemetrySnapshot> {
        self.status().await.map(TelemetrySnapshot::from)
    }
}
