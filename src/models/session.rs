//! Session-related data models.
//!
//! - `IamSession`, `User`, `Role`: the authenticated participant, handed over by the web app.
//! - `SessionProgress`, `Stage`: the backend's view of where the participant is in the run.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub role: Role,
}

/// Authenticated participant run. Replaced wholesale on every login, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IamSession {
    pub token: String,
    pub user: User,
    pub ip_address: String,
    /// Backend-assigned session sequence number.
    #[serde(default)]
    pub session_num: Option<u32>,
}

impl IamSession {
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Waiting,
    ReadComprehension,
    Homework,
    Survey,
    Finished,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Waiting => "waiting",
            Stage::ReadComprehension => "readcomp",
            Stage::Homework => "homework",
            Stage::Survey => "survey",
            Stage::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "waiting" => Some(Stage::Waiting),
            "readcomp" | "read_comprehension" | "read-comprehension" => {
                Some(Stage::ReadComprehension)
            }
            "homework" => Some(Stage::Homework),
            "survey" => Some(Stage::Survey),
            "finished" => Some(Stage::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Stage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Stage::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown stage '{raw}'")))
    }
}

/// Seconds left in the homework stage below which the participant is sent back to the browser.
const HOMEWORK_GRACE_SECS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionProgress {
    pub stage: Stage,
    /// Seconds remaining in the current stage.
    pub remaining_time: i64,
}

impl SessionProgress {
    pub fn has_finished_homework(&self) -> bool {
        match self.stage {
            Stage::Homework => self.remaining_time < HOMEWORK_GRACE_SECS,
            Stage::Survey | Stage::Finished => true,
            Stage::Waiting | Stage::ReadComprehension => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }
}
