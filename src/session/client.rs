use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    StatusCode,
};
use serde_json::Value;

use crate::{
    error::SessionError,
    models::{FeedbackAck, FeedbackSample, IamSession, SessionProgress},
};

use super::{SessionApi, SessionHolder, ERR_NO_ACTIVE_SESSION, ERR_UNAUTHORIZED};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// `detail.errcode` the backend uses to announce the run is over.
const ERRCODE_SESSION_OVER: i64 = 1;

/// Startup probe: `GET {base}/health_check` must answer `200 {"status": "ok"}`.
pub async fn health_check(http: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = http
        .get(format!("{base_url}/health_check"))
        .send()
        .await
        .with_context(|| format!("could not connect to the backend at {base_url}"))?;

    if response.status() != StatusCode::OK {
        bail!("health check answered with status {}", response.status());
    }

    let body: Value = response
        .json()
        .await
        .context("health check answer is not JSON")?;
    if body.get("status").and_then(Value::as_str) != Some("ok") {
        return Err(anyhow!("health check reported {body}"));
    }
    Ok(())
}

/// HTTP client for the backend's session-execution endpoints.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    holder: SessionHolder,
    ingestion_timeout: Duration,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>, holder: SessionHolder, ingestion_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(ingestion_timeout)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            holder,
            ingestion_timeout,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn require_session(&self) -> Result<Arc<IamSession>, SessionError> {
        self.holder.get_iam_session().ok_or(SessionError::NoSession)
    }

    async fn upload(&self, session: &IamSession, sample: &FeedbackSample) -> Result<FeedbackAck, SessionError> {
        let timeout = self.ingestion_timeout;
        let screenshot = tokio::fs::read(&sample.screenshot).await?;
        let file_name = sample
            .screenshot
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("feedback-{}.png", sample.seqnum));
        let part = Part::bytes(screenshot)
            .file_name(file_name)
            .mime_str("image/png")?;
        let form = Form::new().part("screenshot_file", part);

        let pa_feedback_str = serde_json::to_string(&sample.telemetry)
            .map_err(|err| SessionError::malformed(format!("telemetry encoding failed: {err}")))?;

        log_debug!("sending feedback #{} for {}", sample.seqnum, session.username());
        let response = self
            .http
            .post(self.feedback_url(session))
            .bearer_auth(&session.token)
            .query(&[("pa_feedback_str", pa_feedback_str)])
            .multipart(form)
            .send()
            .await
            .map_err(|err| SessionError::from_transport(err, timeout))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| SessionError::from_transport(err, timeout))?;
        parse_ack(status, &body)
    }

    fn progress_url(&self, session: &IamSession) -> String {
        format!(
            "{}/session_execution/students/{}/session",
            self.base_url,
            session.username()
        )
    }

    fn feedback_url(&self, session: &IamSession) -> String {
        format!(
            "{}/session_execution/student/{}/session/feedback",
            self.base_url,
            session.username()
        )
    }
}

fn parse_progress(body: &[u8]) -> Result<SessionProgress, SessionError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| SessionError::malformed(format!("session progress is not JSON: {err}")))?;

    if value.get("status").and_then(Value::as_str) == Some("err") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(match message {
            ERR_NO_ACTIVE_SESSION => SessionError::NoActiveSession,
            ERR_UNAUTHORIZED => SessionError::Unauthorized,
            other => SessionError::UnknownRemote(other.to_string()),
        });
    }

    serde_json::from_value(value).map_err(|err| {
        SessionError::malformed(format!("answer is not a session progress object: {err}"))
    })
}

fn parse_ack(status: StatusCode, body: &[u8]) -> Result<FeedbackAck, SessionError> {
    let value: Option<Value> = serde_json::from_slice(body).ok();

    let errcode = value
        .as_ref()
        .and_then(|v| v.pointer("/detail/errcode"))
        .and_then(Value::as_i64);
    if errcode == Some(ERRCODE_SESSION_OVER) {
        return Ok(FeedbackAck::SessionOver);
    }

    if !status.is_success() {
        return Err(SessionError::UnexpectedStatus(status.as_u16()));
    }

    value
        .map(FeedbackAck::Accepted)
        .ok_or_else(|| SessionError::malformed("feedback acknowledgement is not JSON"))
}

#[async_trait]
impl SessionApi for SessionClient {
    fn iam_session(&self) -> Option<Arc<IamSession>> {
        self.holder.get_iam_session()
    }

    async fn get_session_progress(&self) -> Result<SessionProgress, SessionError> {
        let session = self.require_session()?;
        let response = self
            .http
            .get(self.progress_url(&session))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|err| SessionError::from_transport(err, self.ingestion_timeout))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| SessionError::from_transport(err, self.ingestion_timeout))?;

        let progress = parse_progress(&body)?;
        log_debug!(
            "progress for {}: stage={} remaining={}s",
            session.username(),
            progress.stage,
            progress.remaining_time
        );
        Ok(progress)
    }

    async fn ingest_feedback(&self, sample: &FeedbackSample) -> Result<FeedbackAck, SessionError> {
        let session = self.require_session()?;
        let timeout = self.ingestion_timeout;

        let upload = self.upload(&session, sample);
        let ack = tokio::time::timeout(timeout, upload)
            .await
            .map_err(|_| SessionError::Timeout(timeout))??;

        if !ack.session_active() {
            log_warn!("backend reported the session of {} is over", session.username());
        }
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Stage, TelemetrySnapshot, User};
    use axum::{
        extract::{Multipart, Query, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::{collections::HashMap, path::PathBuf, sync::Mutex};

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn session() -> IamSession {
        IamSession {
            token: "valid-token".into(),
            user: User {
                username: "username".into(),
                password: None,
                role: Role::Student,
            },
            ip_address: "localhost".into(),
            session_num: Some(3),
        }
    }

    fn client(base_url: &str, timeout: Duration) -> SessionClient {
        let holder = SessionHolder::new();
        holder.set_iam_session(Some(session())).unwrap();
        SessionClient::new(base_url, holder, timeout).unwrap()
    }

    async fn progress_backend(answer: Value) -> String {
        let router = Router::new().route(
            "/session_execution/students/:username/session",
            get(move || {
                let answer = answer.clone();
                async move { Json(answer) }
            }),
        );
        spawn_backend(router).await
    }

    fn sample(dir: &tempfile::TempDir) -> FeedbackSample {
        let screenshot: PathBuf = dir.path().join("shot.png");
        std::fs::write(&screenshot, b"png-bytes").unwrap();
        FeedbackSample {
            seqnum: 1,
            captured_at: Utc::now(),
            telemetry: TelemetrySnapshot {
                is_focused: true,
                num_mouse_clicks: 2,
                mouse_scroll_distance: 0.0,
                mouse_move_distance: 10.0,
                keyboard_strokes: 5,
            },
            screenshot,
        }
    }

    #[tokio::test]
    async fn progress_is_parsed() {
        let base = progress_backend(json!({"stage": "homework", "remaining_time": 120})).await;
        let progress = client(&base, Duration::from_secs(5))
            .get_session_progress()
            .await
            .unwrap();
        assert_eq!(progress.stage, Stage::Homework);
        assert_eq!(progress.remaining_time, 120);
    }

    #[tokio::test]
    async fn error_envelopes_map_to_typed_errors() {
        let base = progress_backend(json!({"status": "err", "message": ERR_NO_ACTIVE_SESSION})).await;
        let err = client(&base, Duration::from_secs(5)).get_session_progress().await;
        assert!(matches!(err, Err(SessionError::NoActiveSession)));

        let base = progress_backend(json!({"status": "err", "message": ERR_UNAUTHORIZED})).await;
        let err = client(&base, Duration::from_secs(5)).get_session_progress().await;
        assert!(matches!(err, Err(SessionError::Unauthorized)));

        let base = progress_backend(json!({"status": "err", "message": "database is down"})).await;
        let err = client(&base, Duration::from_secs(5)).get_session_progress().await;
        assert!(matches!(err, Err(SessionError::UnknownRemote(msg)) if msg == "database is down"));
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed_and_still_active() {
        let base = progress_backend(json!({"seqnum": 1})).await;
        let client = client(&base, Duration::from_secs(5));
        assert!(matches!(
            client.get_session_progress().await,
            Err(SessionError::MalformedResponse(_))
        ));
        assert!(client.is_session_active().await);
    }

    #[tokio::test]
    async fn finished_stage_reports_inactive() {
        let base = progress_backend(json!({"stage": "Finished", "remaining_time": 0})).await;
        assert!(!client(&base, Duration::from_secs(5)).is_session_active().await);
    }

    #[tokio::test]
    async fn progress_without_session_fails_before_any_request() {
        let client = SessionClient::new("http://127.0.0.1:9", SessionHolder::new(), Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.get_session_progress().await,
            Err(SessionError::NoSession)
        ));
        assert!(!client.is_session_active().await);
    }

    #[derive(Debug, Clone)]
    struct Upload {
        authorization: Option<String>,
        pa_feedback_str: Option<String>,
        field_name: String,
        bytes: Vec<u8>,
    }

    async fn record_upload(
        State(uploads): State<Arc<Mutex<Vec<Upload>>>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
        mut multipart: Multipart,
    ) -> Json<Value> {
        let field = multipart.next_field().await.unwrap().unwrap();
        let field_name = field.name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap().to_vec();
        uploads.lock().unwrap().push(Upload {
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            pa_feedback_str: query.get("pa_feedback_str").cloned(),
            field_name,
            bytes,
        });
        Json(json!({"status": "success"}))
    }

    #[tokio::test]
    async fn feedback_is_uploaded_as_multipart() {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route(
                "/session_execution/student/:username/session/feedback",
                post(record_upload),
            )
            .with_state(Arc::clone(&uploads));
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();

        let ack = client(&base, Duration::from_secs(5))
            .ingest_feedback(&sample(&dir))
            .await
            .unwrap();
        assert_eq!(ack, FeedbackAck::Accepted(json!({"status": "success"})));

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let upload = &uploads[0];
        assert_eq!(upload.authorization.as_deref(), Some("Bearer valid-token"));
        assert_eq!(upload.field_name, "screenshot_file");
        assert_eq!(upload.bytes, b"png-bytes");
        let telemetry: Value =
            serde_json::from_str(upload.pa_feedback_str.as_deref().unwrap()).unwrap();
        assert_eq!(telemetry["keyboardStrokes"], 5);
        assert_eq!(telemetry["isFocused"], 1);
    }

    #[tokio::test]
    async fn errcode_one_means_session_over() {
        let router = Router::new().route(
            "/session_execution/student/:username/session/feedback",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"detail": {"errcode": 1}})),
                )
                    .into_response()
            }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();

        let ack = client(&base, Duration::from_secs(5))
            .ingest_feedback(&sample(&dir))
            .await
            .unwrap();
        assert_eq!(ack, FeedbackAck::SessionOver);
    }

    #[tokio::test]
    async fn other_failures_are_propagated() {
        let router = Router::new().route(
            "/session_execution/student/:username/session/feedback",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "oops").into_response() }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();
        let result = client(&base, Duration::from_secs(5))
            .ingest_feedback(&sample(&dir))
            .await;
        assert!(matches!(result, Err(SessionError::UnexpectedStatus(500))));

        let router = Router::new().route(
            "/session_execution/student/:username/session/feedback",
            post(|| async { "not json" }),
        );
        let base = spawn_backend(router).await;
        let result = client(&base, Duration::from_secs(5))
            .ingest_feedback(&sample(&dir))
            .await;
        assert!(matches!(result, Err(SessionError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let router = Router::new().route(
            "/session_execution/student/:username/session/feedback",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"status": "success"}))
            }),
        );
        let base = spawn_backend(router).await;
        let dir = tempfile::tempdir().unwrap();

        let result = client(&base, Duration::from_millis(200))
            .ingest_feedback(&sample(&dir))
            .await;
        assert!(matches!(result, Err(SessionError::Timeout(_))));
    }

    #[tokio::test]
    async fn missing_screenshot_is_an_io_error() {
        let base = spawn_backend(Router::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let mut sample = sample(&dir);
        sample.screenshot = dir.path().join("gone.png");
        let result = client(&base, Duration::from_secs(5))
            .ingest_feedback(&sample)
            .await;
        assert!(matches!(result, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn health_check_requires_ok_status() {
        let router = Router::new().route("/health_check", get(|| async { Json(json!({"status": "ok"})) }));
        let base = spawn_backend(router).await;
        health_check(&reqwest::Client::new(), &base).await.unwrap();

        let router = Router::new().route("/health_check", get(|| async { Json(json!({"status": "degraded"})) }));
        let base = spawn_backend(router).await;
        assert!(health_check(&reqwest::Client::new(), &base).await.is_err());
    }
}
