use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{error::BrowserError, session::SessionApi};

use super::BrowserOpener;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sends the participant back to the web app once homework is over.
pub struct BrowserReturnWorker {
    session: Arc<dyn SessionApi>,
    opener: Arc<dyn BrowserOpener>,
    target_url: Option<String>,
    poll_interval: Duration,
    watching: Mutex<bool>,
}

impl BrowserReturnWorker {
    pub fn new(
        session: Arc<dyn SessionApi>,
        opener: Arc<dyn BrowserOpener>,
        target_url: Option<String>,
    ) -> Self {
        Self {
            session,
            opener,
            target_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            watching: Mutex::new(false),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn is_watching(&self) -> bool {
        *self.watching.lock().await
    }

    /// Polls progress until homework is over, then navigates exactly once
    /// when a target is configured. Cancellation ends the watch without
    /// navigating.
    pub async fn start_browser_worker(&self, cancel: CancellationToken) -> Result<(), BrowserError> {
        {
            let mut watching = self.watching.lock().await;
            if *watching {
                return Err(BrowserError::AlreadyRunning);
            }
            *watching = true;
        }

        if self.watch(&cancel).await {
            match &self.target_url {
                Some(url) => {
                    log_info!("homework finished, opening {url}");
                    if let Err(err) = self.opener.open(url).await {
                        log_error!("failed to open browser at {url}: {err:#}");
                    }
                }
                None => log_info!("homework finished, no return page configured"),
            }
        } else {
            log_info!("browser return worker cancelled");
        }

        let mut watching = self.watching.lock().await;
        if !*watching {
            log_error!("browser return flag was cleared while watching");
            return Err(BrowserError::IllegalState(
                "watching flag cleared while the worker was polling",
            ));
        }
        *watching = false;
        Ok(())
    }

    /// True once homework is finished, false if cancelled first.
    async fn watch(&self, cancel: &CancellationToken) -> bool {
        loop {
            let progress = tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                progress = self.session.get_session_progress() => progress,
            };

            match progress {
                Ok(progress) if progress.has_finished_homework() => return true,
                Ok(progress) => log_debug!(
                    "stage {} with {}s left, not returning yet",
                    progress.stage,
                    progress.remaining_time
                ),
                Err(err) => log_warn!("browser return poll failed: {err}"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    #[cfg(test)]
    async fn clear_flag(&self) {
        *self.watching.lock().await = false;
    }
}
