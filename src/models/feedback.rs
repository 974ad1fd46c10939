//! Feedback sample data model.
//!
//! A single telemetry + screenshot observation captured during a study session.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters reported by the local personal-analytics sensor, in the shape the backend ingests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    #[serde(with = "focus_flag")]
    pub is_focused: bool,
    pub num_mouse_clicks: u64,
    pub mouse_scroll_distance: f64,
    pub mouse_move_distance: f64,
    pub keyboard_strokes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSample {
    /// 1-based, monotonic within a session.
    pub seqnum: u32,
    pub captured_at: DateTime<Utc>,
    pub telemetry: TelemetrySnapshot,
    /// Image already written to disk. Removed only through an explicit cleanup.
    pub screenshot: PathBuf,
}

/// Backend answer to a feedback upload.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackAck {
    Accepted(serde_json::Value),
    /// `{"detail": {"errcode": 1}}`: the run is over, stop sampling.
    SessionOver,
}

impl FeedbackAck {
    pub fn session_active(&self) -> bool {
        matches!(self, FeedbackAck::Accepted(_))
    }
}

/// The backend and the sensor encode focus as 0/1, sometimes as `1.0` or `true`.
pub(crate) mod focus_flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Number(i64),
        Float(f64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Ok(flag),
            Raw::Number(n) if n >= 0 => Ok(n != 0),
            Raw::Number(n) => Err(de::Error::custom(format!("negative focus flag {n}"))),
            Raw::Float(f) => super::whole_count::from_float(f).map(|n| n != 0),
        }
    }
}

/// Counters that may arrive as integral floats (`3.0`).
pub(crate) mod whole_count {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Whole(u64),
        Float(f64),
    }

    pub(super) fn from_float<E: de::Error>(value: f64) -> Result<u64, E> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
            Ok(value as u64)
        } else {
            Err(E::custom(format!("expected a whole non-negative number, got {value}")))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Whole(n) => Ok(n),
            Raw::Float(f) => from_float(f),
        }
    }
}
