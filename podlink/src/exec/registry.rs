//! Exec session registry.
//!
//! Thread-safe bookkeeping for exec sessions. Owns no network resources.
//! `transition` validates against the state machine and is atomic per id:
//! two concurrent attach attempts cannot both observe `Created`.

use crate::errors::{PodlinkError, PodlinkResult};
use crate::exec::session::{ExecSession, SessionState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of exec sessions, keyed by engine-assigned id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, ExecSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Insert a new session.
    ///
    /// Fails with `DuplicateSession` if the id is already registered in a
    /// non-terminal state; a terminal entry is replaced.
    pub fn record(&self, session: ExecSession) -> PodlinkResult<()> {
        let mut sessions = self.sessions.lock();

        if let Some(existing) = sessions.get(&session.id) {
            if !existing.state.is_terminal() {
                return Err(PodlinkError::DuplicateSession(session.id.clone()));
            }
        }

        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Get a session snapshot.
    pub fn get(&self, id: &str) -> PodlinkResult<ExecSession> {
        self.sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| PodlinkError::UnknownSession(id.to_string()))
    }

    /// Compare-and-transition: validate and apply under one lock.
    ///
    /// Returns the session snapshot after the transition.
    pub fn transition(&self, id: &str, new_state: SessionState) -> PodlinkResult<ExecSession> {
        let mut sessions = self.sessions.lock();

        let session = sessions
            .get_mut(id)
            .ok_or_else(|| PodlinkError::UnknownSession(id.to_string()))?;

        session.transition_to(new_state)?;
        Ok(session.clone())
    }
}
