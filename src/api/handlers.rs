use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{
    db::FeedbackRecord,
    error::CollectorError,
    models::IamSession,
    AppState,
};

use super::error::{ApiError, ERR_NOT_LOGGED_IN};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: &'static str,
}

impl StatusMessage {
    const fn success(message: &'static str) -> Self {
        Self {
            status: "success",
            message,
        }
    }
}

fn spawn_sensing(state: &AppState) {
    let sensing = Arc::clone(&state.sensing);
    tokio::spawn(async move { sensing.start_sensing().await });
}

pub async fn set_session(
    State(state): State<AppState>,
    Json(session): Json<IamSession>,
) -> Result<StatusCode, ApiError> {
    let session = state
        .holder
        .set_iam_session(Some(session))
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    if state.session.is_session_active().await {
        log_info!("{} already has an active session, starting collection", session.username());
        spawn_sensing(&state);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(State(state): State<AppState>) -> Result<Json<IamSession>, ApiError> {
    match state.holder.get_iam_session() {
        Some(session) => Ok(Json(session.as_ref().clone())),
        None => {
            log_info!("{ERR_NOT_LOGGED_IN}");
            Err(ApiError::PreconditionFailed(ERR_NOT_LOGGED_IN.into()))
        }
    }
}

pub async fn start_collection(
    State(state): State<AppState>,
) -> Result<Json<StatusMessage>, ApiError> {
    if state.holder.get_iam_session().is_none() {
        return Err(ApiError::PreconditionFailed(ERR_NOT_LOGGED_IN.into()));
    }
    spawn_sensing(&state);
    Ok(Json(StatusMessage::success("Data collection has started")))
}

pub async fn stop_collection(State(state): State<AppState>) -> Json<StatusMessage> {
    match state.sensing.stop_collecting().await {
        Ok(()) => {}
        Err(CollectorError::NotRunning) => log_warn!("stop requested but collection is not running"),
        Err(err) => log_error!("failed to stop collection: {err}"),
    }
    Json(StatusMessage::success("Data collection stopped successfully"))
}

pub async fn check_personal_analytics(State(state): State<AppState>) -> Json<bool> {
    Json(state.analytics.check().await)
}

pub async fn recent_feedback(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    state.feedbacks.get_all().await.map(Json).map_err(|err| {
        log_error!("failed to read local feedback: {err:#}");
        ApiError::Internal(err.to_string())
    })
}
