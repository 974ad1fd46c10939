//! Remote session lifecycle: who is logged in, where they are in the run,
//! and the feedback upload.

pub mod client;
pub mod holder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::SessionError,
    models::{FeedbackAck, FeedbackSample, IamSession, SessionProgress},
};

pub use client::{health_check, SessionClient};
pub use holder::SessionHolder;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Backend error message for a participant without a running session.
pub const ERR_NO_ACTIVE_SESSION: &str = "You do not have an active session yet";
/// Backend error message for a rejected token.
pub const ERR_UNAUTHORIZED: &str = "You are not authorized to perform this action";

#[async_trait]
pub trait SessionApi: Send + Sync {
    fn iam_session(&self) -> Option<Arc<IamSession>>;

    async fn get_session_progress(&self) -> Result<SessionProgress, SessionError>;

    /// Fail-open: only a finished stage, a missing session or a rejected login
    /// count as inactive. Anomalous answers keep collection going.
    async fn is_session_active(&self) -> bool {
        match self.get_session_progress().await {
            Ok(progress) => !progress.is_finished(),
            Err(SessionError::NoSession)
            | Err(SessionError::NoActiveSession)
            | Err(SessionError::Unauthorized) => false,
            Err(err) => {
                log_warn!("session progress check failed, assuming session is active: {err}");
                true
            }
        }
    }

    async fn ingest_feedback(&self, sample: &FeedbackSample) -> Result<FeedbackAck, SessionError>;
}
