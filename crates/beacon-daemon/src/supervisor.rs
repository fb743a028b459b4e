//! Runs one session per configured account.

use beacon_client::{Engine, EventStream, Session, SessionEvent, SessionUpdate};
use beacon_core::{
    AccountProfile, ConnectionState, DEFAULT_LOG_CAPACITY, LogEntry, LogLevel, LogRing,
    SessionConfig,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::Level;

/// What the daemon knows about one account.
#[derive(Debug, Clone)]
pub struct AccountStatus {
    pub label: String,
    pub state: ConnectionState,
    pub logs: LogRing,
    pub profile: Option<AccountProfile>,
    pub rotation_index: Option<usize>,
    /// When the session last came online. Cleared when it leaves Online.
    pub started_at: Option<DateTime<Utc>>,
    /// Length of the last finished online span.
    pub online_for: Option<chrono::Duration>,
    /// Last event seen while online.
    pub last_seen: Option<DateTime<Utc>>,
}

impl AccountStatus {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: ConnectionState::Offline,
            logs: LogRing::new(DEFAULT_LOG_CAPACITY),
            profile: None,
            rotation_index: None,
            started_at: None,
            online_for: None,
            last_seen: None,
        }
    }

    /// Length of the current online span, or of the last one once offline.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.started_at
            .map(|started| now - started)
            .or(self.online_for)
    }

    fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) {
        match event.state {
            ConnectionState::Online => {
                if self.state != ConnectionState::Online {
                    self.started_at = Some(now);
                }
                self.last_seen = Some(now);
            }
            _ => {
                if let Some(started) = self.started_at.take() {
                    self.online_for = Some(now - started);
                }
            }
        }
        self.state = event.state;

        match event.update {
            Some(SessionUpdate::Profile(profile)) => self.profile = Some(profile),
            Some(SessionUpdate::RotationIndex(index)) => self.rotation_index = Some(index),
            None => {}
        }
        if let Some(entry) = event.log {
            mirror(&self.label, &entry);
            self.logs.push(entry);
        }
    }
}

fn tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Info | LogLevel::Success => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
    }
}

fn mirror(label: &str, entry: &LogEntry) {
    let level = tracing_level(entry.level);
    if level == Level::ERROR {
        tracing::error!(account = %label, "{}", entry.message);
    } else if level == Level::INFO {
        tracing::info!(account = %label, "{}", entry.message);
    } else {
        tracing::debug!(account = %label, "{}", entry.message);
    }
}

type Board = Arc<Mutex<BTreeMap<String, AccountStatus>>>;

fn lock(board: &Mutex<BTreeMap<String, AccountStatus>>) -> MutexGuard<'_, BTreeMap<String, AccountStatus>> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the sessions and the status board they feed.
pub struct Supervisor {
    sessions: Vec<Arc<Session>>,
    board: Board,
    watchers: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Create a session per account and start recording their events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(engine: &Engine, accounts: Vec<SessionConfig>) -> Self {
        let board: Board = Arc::default();
        let mut sessions = Vec::with_capacity(accounts.len());
        let mut watchers = Vec::with_capacity(accounts.len());

        for config in accounts {
            let label = config.label.clone();
            lock(&board).insert(label.clone(), AccountStatus::new(&label));
            let (session, events) = engine.session(config);
            sessions.push(Arc::new(session));
            watchers.push(tokio::spawn(watch(label, events, board.clone())));
        }

        Self {
            sessions,
            board,
            watchers,
        }
    }

    /// Connect every session.
    pub fn start(&self) {
        for session in &self.sessions {
            tracing::info!("Starting {}", session.label());
            session.connect();
        }
    }

    /// Disconnect every session and wait for their transports to close.
    pub async fn shutdown(&self) {
        for session in &self.sessions {
            session.disconnect();
        }
        for session in &self.sessions {
            session.closed().await;
        }
    }

    /// The session for an account label.
    pub fn session(&self, label: &str) -> Option<Arc<Session>> {
        self.sessions.iter().find(|s| s.label() == label).cloned()
    }

    /// Current status of one account.
    pub fn status(&self, label: &str) -> Option<AccountStatus> {
        lock(&self.board).get(label).cloned()
    }

    /// Snapshot of every account, ordered by label.
    pub fn statuses(&self) -> Vec<AccountStatus> {
        lock(&self.board).values().cloned().collect()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

async fn watch(label: String, mut events: EventStream, board: Board) {
    while let Some(event) = events.recv().await {
        if let Some(status) = lock(&board).get_mut(&label) {
            status.apply(event, Utc::now());
        }
    }
    tracing::debug!("Event stream for {} closed", label);
}
