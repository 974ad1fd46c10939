use std::sync::{Arc, RwLock};

use crate::{error::SessionError, models::IamSession};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Single place the current login lives. Sessions are published whole and
/// read as shared snapshots; nothing mutates a published session.
#[derive(Clone, Default)]
pub struct SessionHolder {
    inner: Arc<RwLock<Option<Arc<IamSession>>>>,
}

impl SessionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_iam_session(
        &self,
        session: Option<IamSession>,
    ) -> Result<Arc<IamSession>, SessionError> {
        let session = session
            .ok_or_else(|| SessionError::InvalidArgument("session cannot be absent".into()))?;
        if session.user.username.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "session username cannot be empty".into(),
            ));
        }

        let session = Arc::new(session);
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&session));
        drop(guard);

        log_info!(
            "session set for user {} (session_num={:?})",
            session.username(),
            session.session_num
        );
        Ok(session)
    }

    pub fn get_iam_session(&self) -> Option<Arc<IamSession>> {
        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }
}
