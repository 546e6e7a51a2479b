//! Guards against overlapping syncs triggered by outside events.
//!
//! A [`SyncSession`] moves `Idle → Syncing → Resuming → Idle`. A trigger
//! is only accepted while idle; it hands out a [`SyncTicket`] which holds
//! the session until dropped. After a successful sync the holder calls
//! [`SyncTicket::resume`] while it hands the result to its consumer, so a
//! trigger caused by that hand-off is rejected instead of starting a new
//! sync.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use miette::Diagnostic;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Syncing,
    Resuming,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Syncing => write!(f, "syncing"),
            SessionState::Resuming => write!(f, "resuming"),
        }
    }
}

#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("A sync is already in progress ({state})")]
    #[diagnostic(code(bundlesync::session::busy))]
    Busy { state: SessionState },
}

#[derive(Debug, Clone)]
pub struct SyncSession {
    state: Arc<Mutex<SessionState>>,
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_idle(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// Starts a sync if none is running.
    pub fn trigger(&self) -> Result<SyncTicket, SessionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SessionState::Idle {
            return Err(SessionError::Busy { state: *state });
        }

        *state = SessionState::Syncing;
        trace!("session: idle -> syncing");
        Ok(SyncTicket {
            state: self.state.clone(),
        })
    }
}

/// Exclusive right to run a sync. Dropping it returns the session to idle.
#[derive(Debug)]
pub struct SyncTicket {
    state: Arc<Mutex<SessionState>>,
}

impl SyncTicket {
    /// Marks the sync as finished and its result as being handed over.
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Syncing {
            *state = SessionState::Resuming;
            trace!("session: syncing -> resuming");
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncTicket {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        trace!("session: {} -> idle", *state);
        *state = SessionState::Idle;
    }
}
