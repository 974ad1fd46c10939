//! Locally persisted feedback row.

use serde::{Deserialize, Serialize};

use crate::models::FeedbackSample;

/// A feedback sample together with the login it was captured under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub student_name: String,
    pub session_num: u32,
    #[serde(flatten)]
    pub sample: FeedbackSample,
}
