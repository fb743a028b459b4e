//! Session configuration handed to the engine at connect time.

use crate::emoji::EmojiRef;
use crate::proxy::ProxyDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account credential. Opaque; never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// The raw secret, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Presence status broadcast to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
}

impl PresenceStatus {
    /// Gateway name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Idle => "idle",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Invisible => "invisible",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rich activity ("Playing X") shown below the custom status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichActivity {
    pub name: String,
    /// Activity type code (0 playing, 1 streaming, 2 listening, 3 watching, 5 competing).
    #[serde(default, rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
}

/// Fixed presence: one custom status plus an optional rich activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPresence {
    #[serde(default)]
    pub status_text: String,
    /// Emoji shorthand, `name:id` or a bare name.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Whether `activity` is broadcast at all.
    #[serde(default)]
    pub rich_presence: bool,
    #[serde(default)]
    pub activity: Option<RichActivity>,
}

impl StaticPresence {
    /// Parsed emoji, if one is set and valid.
    pub fn emoji_ref(&self) -> Option<EmojiRef> {
        self.emoji
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EmojiRef::from_shorthand)
    }
}

/// Rotating presence: cycles through `statuses` on a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    pub statuses: Vec<String>,
    /// Requested interval in seconds. The engine never rotates faster than its floor.
    #[serde(default = "default_interval", rename = "interval")]
    pub interval_secs: u64,
    /// Last cursor reported by the engine. Informational; every fresh connect starts at 0.
    #[serde(default)]
    pub current_index: usize,
}

fn default_interval() -> u64 {
    60
}

impl RotationConfig {
    /// Rotation over `statuses`, ticking every `interval_secs` (subject to the floor).
    pub fn new(statuses: Vec<String>, interval_secs: u64) -> Self {
        Self {
            statuses,
            interval_secs,
            current_index: 0,
        }
    }
}

/// The two mutually exclusive session kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Static(StaticPresence),
    Rotating(RotationConfig),
}

/// Everything the engine reads once per `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub label: String,
    pub token: Token,
    #[serde(default)]
    pub status: PresenceStatus,
    pub kind: SessionKind,
    #[serde(default)]
    pub proxy: Option<ProxyDescriptor>,
}

impl SessionConfig {
    /// Config with online status and no proxy.
    pub fn new(label: impl Into<String>, token: Token, kind: SessionKind) -> Self {
        Self {
            label: label.into(),
            token,
            status: PresenceStatus::default(),
            kind,
            proxy: None,
        }
    }

    /// Set the presence status.
    pub fn with_status(mut self, status: PresenceStatus) -> Self {
        self.status = status;
        self
    }

    /// Route through `proxy`.
    pub fn with_proxy(mut self, proxy: ProxyDescriptor) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Rotation settings, for rotating sessions.
    pub fn rotation(&self) -> Option<&RotationConfig> {
        match &self.kind {
            SessionKind::Rotating(r) => Some(r),
            SessionKind::Static(_) => None,
        }
    }

    /// Check the config can drive a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if self.token.is_empty() {
            return Err(ConfigError::EmptyToken(self.label.clone()));
        }
        match &self.kind {
            SessionKind::Rotating(r) if r.statuses.is_empty() => {
                Err(ConfigError::EmptyStatusList(self.label.clone()))
            }
            SessionKind::Static(s) => match &s.emoji {
                Some(e) if !e.trim().is_empty() => e
                    .parse::<EmojiRef>()
                    .map(|_| ())
                    .map_err(|err| ConfigError::Emoji(self.label.clone(), err)),
                _ => Ok(()),
            },
            SessionKind::Rotating(_) => Ok(()),
        }
    }
}

/// Invalid session configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("session label cannot be empty")]
    EmptyLabel,
    #[error("session '{0}' has no token")]
    EmptyToken(String),
    #[error("rotating session '{0}' has an empty status list")]
    EmptyStatusList(String),
    #[error("session '{0}' has an invalid emoji: {1}")]
    Emoji(String, crate::emoji::EmojiParseError),
}
