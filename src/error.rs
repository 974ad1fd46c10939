use std::time::Duration;

use thiserror::Error;

/// Misuse of the iteration accounting in [`crate::timing::TimingController`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

/// Failures surfaced by the remote session service.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no session has been set")]
    NoSession,

    #[error("there is no active session for the authenticated user")]
    NoActiveSession,

    #[error("the authenticated user is not authorized")]
    Unauthorized,

    #[error("backend returned an unknown error: {0}")]
    UnknownRemote(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("backend answered with status {0}")]
    UnexpectedStatus(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        SessionError::MalformedResponse(msg.into())
    }

    /// Maps reqwest failures so timeouts keep their own variant.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            SessionError::Timeout(timeout)
        } else if err.is_decode() {
            SessionError::MalformedResponse(err.to_string())
        } else {
            SessionError::Transport(err)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("feedback collection is already running")]
    AlreadyRunning,

    #[error("feedback collection is not running")]
    NotRunning,

    #[error("precondition failed: no session")]
    NoSession,

    #[error("precondition failed: no active session")]
    NoActiveSession,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("browser return worker is already running")]
    AlreadyRunning,

    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session number was not yet set")]
    SessionNumberUnset,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}
