use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{CollectorError, SessionError},
    models::IamSession,
    session::SessionApi,
    timing::TimingController,
};

use super::{FeedbackCapture, FeedbackSink};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Default)]
struct RunState {
    running: bool,
    generation: u64,
    cancel: CancellationToken,
}

/// The feedback collection loop. At most one run is active per instance.
pub struct Collector {
    session: Arc<dyn SessionApi>,
    capture: FeedbackCapture,
    sink: Arc<dyn FeedbackSink>,
    timing: Mutex<TimingController>,
    state: Mutex<RunState>,
}

impl Collector {
    pub fn new(
        session: Arc<dyn SessionApi>,
        capture: FeedbackCapture,
        sink: Arc<dyn FeedbackSink>,
        timing: TimingController,
    ) -> Self {
        Self {
            session,
            capture,
            sink,
            timing: Mutex::new(timing),
            state: Mutex::new(RunState::default()),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Runs until the session is over, `cancel` fires or
    /// [`stop_collecting`](Self::stop_collecting) is called. Returns once the
    /// loop has exited.
    pub async fn start_collecting(&self, cancel: CancellationToken) -> Result<(), CollectorError> {
        let (generation, cancel) = {
            let mut state = self.state.lock().await;
            if state.running {
                return Err(CollectorError::AlreadyRunning);
            }
            state.running = true;
            state.generation += 1;
            state.cancel = cancel.child_token();
            (state.generation, state.cancel.clone())
        };

        let result = self.run(generation, &cancel).await;

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.running = false;
        }
        result
    }

    /// Only arms cancellation; the loop exits at its next check or
    /// abandons the in-flight wait or upload.
    pub async fn stop_collecting(&self) -> Result<(), CollectorError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Err(CollectorError::NotRunning);
        }
        state.running = false;
        state.cancel.cancel();
        log_info!("feedback collection stop requested");
        Ok(())
    }

    async fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock().await;
        state.running && state.generation == generation
    }

    async fn run(&self, generation: u64, cancel: &CancellationToken) -> Result<(), CollectorError> {
        if cancel.is_cancelled() {
            log_info!("feedback collection cancelled before it started");
            return Ok(());
        }

        let session = self.session.iam_session().ok_or(CollectorError::NoSession)?;
        if !self.session.is_session_active().await {
            return Err(CollectorError::NoActiveSession);
        }

        log_info!("starting feedback collection for {}", session.username());
        let mut timing = self.timing.lock().await;
        let mut session_active = true;

        while session_active {
            if cancel.is_cancelled() || !self.is_current(generation).await {
                log_info!("feedback collection for {} was stopped", session.username());
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timing.wait() => {}
            }

            if let Err(err) = timing.start_iteration() {
                log_error!("iteration accounting out of sync: {err}");
                break;
            }

            session_active = self.iterate(&session, cancel).await;

            if let Err(err) = timing.finish_iteration() {
                log_error!("iteration accounting out of sync: {err}");
                break;
            }
        }

        log_info!("feedback collection for {} finished", session.username());
        Ok(())
    }

    /// One capture, upload and local write. Returns whether the session is
    /// still active; only the backend's answer can turn it off.
    async fn iterate(&self, session: &IamSession, cancel: &CancellationToken) -> bool {
        let username = session.username();
        let sample = match self.capture.capture(session).await {
            Ok(sample) => sample,
            Err(err) => {
                log_error!("feedback capture failed for {username}: {err:#}");
                return true;
            }
        };
        let seqnum = sample.seqnum;

        let session_active = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_info!("upload of feedback {seqnum} for {username} abandoned on stop");
                true
            }
            result = self.session.ingest_feedback(&sample) => match result {
                Ok(ack) => ack.session_active(),
                Err(SessionError::Timeout(budget)) => {
                    log_warn!("feedback {seqnum} for {username} timed out after {budget:?}");
                    true
                }
                Err(err) => {
                    log_error!("feedback {seqnum} for {username} was not ingested: {err}");
                    true
                }
            }
        };

        if let Err(err) = self.sink.insert(&sample, session).await {
            log_error!("failed to store feedback {seqnum} for {username} locally: {err}");
        }

        session_active
    }
}
