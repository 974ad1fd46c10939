#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use studylink_lib::{
    browser::{BrowserOpener, BrowserReturnWorker},
    db::{Database, FeedbackRepository},
    models::{IamSession, Role, TelemetrySnapshot, User},
    sensing::{
        Collector, FeedbackCapture, PersonalAnalyticsClient, ScreenshotSource, SensingController,
        TelemetrySource,
    },
    session::{SessionApi, SessionClient, SessionHolder},
    timing::TimingController,
    AppState,
};
use tempfile::TempDir;

pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Address nothing is listening on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn student(username: &str, session_num: u32) -> IamSession {
    IamSession {
        token: format!("{username}-token"),
        user: User {
            username: username.into(),
            password: Some("secret".into()),
            role: Role::Student,
        },
        ip_address: "127.0.0.1".into(),
        session_num: Some(session_num),
    }
}

pub struct FocusedTelemetry;

#[async_trait]
impl TelemetrySource for FocusedTelemetry {
    async fn snapshot(&self) -> anyhow::Result<TelemetrySnapshot> {
        Ok(TelemetrySnapshot {
            is_focused: true,
            num_mouse_clicks: 2,
            mouse_scroll_distance: 10.0,
            mouse_move_distance: 250.5,
            keyboard_strokes: 31,
        })
    }
}

/// Writes a small PNG per capture.
pub struct PngScreens {
    pub dir: PathBuf,
}

#[async_trait]
impl ScreenshotSource for PngScreens {
    async fn capture(&self) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        image::RgbImage::new(2, 2).save(&path)?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl BrowserOpener for RecordingOpener {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub struct Agent {
    pub state: AppState,
    pub client: Arc<SessionClient>,
    pub opener: Arc<RecordingOpener>,
    pub url: String,
}

/// The production wiring with fake sensors and browser, served on a free port.
pub async fn spawn_agent(backend_url: &str, pa_url: &str, dir: &TempDir) -> Agent {
    let holder = SessionHolder::new();
    let client = Arc::new(
        SessionClient::new(backend_url, holder.clone(), Duration::from_secs(5)).unwrap(),
    );
    let session: Arc<dyn SessionApi> = client.clone();

    let feedbacks =
        FeedbackRepository::new(Database::new(dir.path().join("agent.sqlite3")).unwrap());
    let screens = dir.path().join("screenshots");
    std::fs::create_dir_all(&screens).unwrap();

    let collector = Collector::new(
        Arc::clone(&session),
        FeedbackCapture::new(Arc::new(FocusedTelemetry), Arc::new(PngScreens { dir: screens })),
        Arc::new(feedbacks.clone()),
        TimingController::with_cadence(0),
    );
    let opener = Arc::new(RecordingOpener::default());
    let browser = BrowserReturnWorker::new(
        Arc::clone(&session),
        opener.clone(),
        Some("https://example.org/app/?autoclose=true".to_string()),
    )
    .with_poll_interval(Duration::from_millis(20));

    let state = AppState {
        holder,
        session,
        sensing: Arc::new(SensingController::new(Arc::new(collector), Arc::new(browser))),
        feedbacks,
        analytics: PersonalAnalyticsClient::new(pa_url).unwrap(),
    };
    let url = serve(studylink_lib::api::router(state.clone())).await;

    Agent {
        state,
        client,
        opener,
        url,
    }
}

/// Polls `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
