use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{browser::BrowserReturnWorker, error::CollectorError};

use super::Collector;

struct ActiveRun {
    cancel_token: CancellationToken,
    collector: JoinHandle<()>,
    browser: JoinHandle<()>,
}

/// Supervises the collector and the browser return worker. Each start
/// replaces the previous pair of tasks after cancelling and joining them.
pub struct SensingController {
    collector: Arc<Collector>,
    browser: Arc<BrowserReturnWorker>,
    run: Mutex<Option<ActiveRun>>,
}

impl SensingController {
    pub fn new(collector: Arc<Collector>, browser: Arc<BrowserReturnWorker>) -> Self {
        Self {
            collector,
            browser,
            run: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub async fn start_sensing(&self) {
        let mut run = self.run.lock().await;
        if let Some(previous) = run.take() {
            info!("replacing the running collection with a new one");
            self.shutdown_run(previous).await;
        }

        let cancel_token = CancellationToken::new();

        let collector = tokio::spawn({
            let collector = Arc::clone(&self.collector);
            let token = cancel_token.child_token();
            async move {
                match collector.start_collecting(token).await {
                    Ok(()) => info!("feedback collection ended"),
                    Err(err) => warn!("feedback collection did not run: {err}"),
                }
            }
        });

        let browser = tokio::spawn({
            let browser = Arc::clone(&self.browser);
            let token = cancel_token.child_token();
            async move {
                if let Err(err) = browser.start_browser_worker(token).await {
                    warn!("browser return worker failed: {err}");
                }
            }
        });

        *run = Some(ActiveRun {
            cancel_token,
            collector,
            browser,
        });
    }

    pub async fn stop_collecting(&self) -> Result<(), CollectorError> {
        self.collector.stop_collecting().await
    }

    /// Cancels both tasks and waits for them.
    pub async fn stop_sensing(&self) {
        if let Some(previous) = self.run.lock().await.take() {
            self.shutdown_run(previous).await;
        }
    }

    async fn shutdown_run(&self, run: ActiveRun) {
        run.cancel_token.cancel();
        match self.collector.stop_collecting().await {
            Ok(()) | Err(CollectorError::NotRunning) => {}
            Err(err) => warn!("failed to stop feedback collection: {err}"),
        }

        if let Err(err) = run.collector.await {
            error!("collector task failed to join: {err}");
        }
        if let Err(err) = run.browser.await {
            error!("browser return task failed to join: {err}");
        }
    }
}
