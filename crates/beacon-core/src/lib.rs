//! Core types for beacon.
//!
//! This crate holds everything that is pure data: session configuration,
//! proxy descriptors, the presence payload builder, and the gateway and relay
//! wire frames. The connection engine lives in `beacon-client`.

mod emoji;
mod gateway;
mod log;
mod presence;
mod profile;
mod proxy;
mod relay;
mod session;

pub use emoji::{EmojiParseError, EmojiRef};
pub use gateway::{
    ClientFrame, CloseDisposition, ConnectionProperties, DEFAULT_GATEWAY_URL, FrameError,
    GatewayEvent, GatewayFrame, Identify, InboundFrame, NORMAL_CLOSURE,
};
pub use log::{DEFAULT_LOG_CAPACITY, LogEntry, LogLevel, LogRing};
pub use presence::{Activity, CUSTOM_STATUS_NAME, Presence, ROTATION_FALLBACK_TEXT};
pub use profile::{AccountProfile, BIO_MAX_CHARS, HypeSquadHouse, ProfilePatch};
pub use proxy::{ProbeResult, ProxyDescriptor, ProxyKind};
pub use relay::{ProxyParams, RelayReply, RelayRequest, RestRequest};
pub use session::{
    ConfigError, PresenceStatus, RichActivity, RotationConfig, SessionConfig, SessionKind,
    StaticPresence, Token,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle state of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    #[default]
    Offline,
    /// Opening the transport or negotiating the handshake.
    Connecting,
    /// Ready received, presence is live.
    Online,
    /// Last attempt failed; see the most recent log line for the cause.
    Error,
}

impl ConnectionState {
    /// Upper-case name used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Offline => "OFFLINE",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Online => "ONLINE",
            ConnectionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
