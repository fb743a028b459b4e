//! Upward reporting.
//!
//! Each session owns one event channel. Every state transition, log-worthy
//! event, successful mutation, and rotation tick produces one
//! [`SessionEvent`] carrying the state at that moment.

use beacon_core::{AccountProfile, ConnectionState, LogEntry};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Side-channel payload attached to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Fresh account profile, from Ready or a mutation.
    Profile(AccountProfile),
    /// The rotation cursor after a tick.
    RotationIndex(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub state: ConnectionState,
    pub log: Option<LogEntry>,
    pub update: Option<SessionUpdate>,
}

/// Receiving end of a session's events.
pub type EventStream = mpsc::UnboundedReceiver<SessionEvent>;

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: ConnectionState,
    /// Bumped whenever a connection task is started or retired.
    pub(crate) generation: u64,
    sink: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    pub(crate) fn new(sink: mpsc::UnboundedSender<SessionEvent>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            state: ConnectionState::Offline,
            generation: 0,
            sink,
        }))
    }

    pub(crate) fn emit(
        &mut self,
        state: ConnectionState,
        log: Option<LogEntry>,
        update: Option<SessionUpdate>,
    ) {
        self.state = state;
        let _ = self.sink.send(SessionEvent { state, log, update });
    }
}

pub(crate) fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection task's handle on the shared sink.
///
/// Once the session retires the task's generation, everything the task
/// reports is dropped, so a disconnected task can never flip the state back.
#[derive(Debug, Clone)]
pub(crate) struct Reporter {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    prefix: Option<String>,
}

impl Reporter {
    pub(crate) fn new(shared: Arc<Mutex<Shared>>, generation: u64, prefix: Option<String>) -> Self {
        Self {
            shared,
            generation,
            prefix,
        }
    }

    /// Returns false if this reporter has been retired.
    pub(crate) fn emit(
        &self,
        state: Option<ConnectionState>,
        log: Option<LogEntry>,
        update: Option<SessionUpdate>,
    ) -> bool {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return false;
        }
        let log = log.map(|mut entry| {
            if let Some(prefix) = &self.prefix {
                entry.message = format!("[{prefix}] {}", entry.message);
            }
            entry
        });
        let state = state.unwrap_or(shared.state);
        shared.emit(state, log, update);
        true
    }

    pub(crate) fn transition(&self, state: ConnectionState, log: LogEntry) -> bool {
        self.emit(Some(state), Some(log), None)
    }

    pub(crate) fn log(&self, log: LogEntry) -> bool {
        self.emit(None, Some(log), None)
    }

    pub(crate) fn update(&self, update: SessionUpdate) -> bool {
        self.emit(None, None, Some(update))
    }

    pub(crate) fn is_current(&self) -> bool {
        lock(&self.shared).generation == self.generation
    }
}
