pub mod api;
pub mod browser;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sensing;
pub mod session;
pub mod timing;
pub mod utils;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use browser::{BrowserReturnWorker, SystemBrowser};
use config::Config;
use db::{Database, FeedbackRepository};
use sensing::{
    Collector, CommandScreenshotter, FeedbackCapture, PersonalAnalyticsClient, SensingController,
};
use session::{health_check, SessionApi, SessionClient, SessionHolder};
use timing::TimingController;

/// Shared by every control API handler.
#[derive(Clone)]
pub struct AppState {
    pub holder: SessionHolder,
    pub session: Arc<dyn SessionApi>,
    pub sensing: Arc<SensingController>,
    pub feedbacks: FeedbackRepository,
    pub analytics: PersonalAnalyticsClient,
}

impl AppState {
    /// Wires the production collaborators described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.base_url();
        let holder = SessionHolder::new();
        let client = SessionClient::new(base_url.clone(), holder.clone(), config.ingestion_timeout())?;

        if config.health_check_enabled() {
            health_check(client.http(), &base_url)
                .await
                .context("backend health check failed")?;
            info!("backend at {base_url} is healthy");
        } else {
            info!("skipping backend health check");
        }

        let database = Database::new(config.sqlite_db_path.clone())?;
        let feedbacks = FeedbackRepository::new(database);
        feedbacks
            .ensure_schema()
            .await
            .context("failed to prepare the local feedback store")?;

        let screenshot_dir = config.screenshot_dir();
        std::fs::create_dir_all(&screenshot_dir).with_context(|| {
            format!("failed to create screenshot directory {}", screenshot_dir.display())
        })?;

        let analytics = PersonalAnalyticsClient::new(config.pa_url.clone())?;
        let session: Arc<dyn SessionApi> = Arc::new(client);

        let capture = FeedbackCapture::new(
            Arc::new(analytics.clone()),
            Arc::new(CommandScreenshotter::new(screenshot_dir)),
        );
        let collector = Collector::new(
            Arc::clone(&session),
            capture,
            Arc::new(feedbacks.clone()),
            TimingController::with_cadence(config.cadence_secs),
        );
        let browser = BrowserReturnWorker::new(
            Arc::clone(&session),
            Arc::new(SystemBrowser),
            config.browser_return_url(),
        );

        Ok(Self {
            holder,
            session,
            sensing: Arc::new(SensingController::new(Arc::new(collector), Arc::new(browser))),
            feedbacks,
            analytics,
        })
    }
}

/// Serves the control API until ctrl-c, then stops any running collection.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(&config).await?;
    let sensing = Arc::clone(&state.sensing);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control API on {addr}"))?;
    info!("control API listening on {addr}");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
            }
        })
        .await
        .context("control API server error")?;

    sensing.stop_sensing().await;
    info!("studylink stopped");
    Ok(())
}

pub fn run() -> Result<()> {
    utils::logging::init();

    let config = Config::parse();
    info!(
        "studylink starting in {} mode against {}",
        config.environment.as_str(),
        config.base_url()
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(config))
}
