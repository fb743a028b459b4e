//! Gateway frames.
//!
//! Inbound frames are `{op, d, s, t}` envelopes decoded into [`GatewayEvent`];
//! outbound frames are [`ClientFrame`] values serialized as `{op, d}`. Only the
//! opcodes the engine exercises are modelled; anything else decodes to
//! [`GatewayEvent::Other`].

use crate::presence::Presence;
use crate::profile::AccountProfile;
use crate::relay::RelayReply;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use twilight_model::gateway::{CloseCode, OpCode};

/// Default gateway endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Close code sent on a user-initiated disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Raw inbound envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayFrame {
    /// Sequence number, present on dispatches.
    pub sequence: Option<u64>,
    pub event: GatewayEvent,
}

/// The subset of server events the engine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Hello { heartbeat_interval: Duration },
    Ready(AccountProfile),
    /// Any dispatch other than Ready.
    Dispatch { name: String },
    HeartbeatRequest,
    HeartbeatAck,
    InvalidSession { resumable: bool },
    Reconnect,
    Other(u8),
}

impl GatewayFrame {
    fn from_envelope(env: Envelope) -> Result<Self, FrameError> {
        let event = match OpCode::from(env.op) {
            Some(OpCode::Hello) => {
                let millis = env
                    .d
                    .get("heartbeat_interval")
                    .and_then(serde_json::Value::as_u64)
                    .filter(|ms| *ms > 0)
                    .ok_or(FrameError::MissingField("heartbeat_interval"))?;
                GatewayEvent::Hello {
                    heartbeat_interval: Duration::from_millis(millis),
                }
            }
            Some(OpCode::Dispatch) => match env.t.as_deref() {
                Some("READY") => {
                    let user = env
                        .d
                        .get("user")
                        .cloned()
                        .ok_or(FrameError::MissingField("user"))?;
                    GatewayEvent::Ready(serde_json::from_value(user)?)
                }
                name => GatewayEvent::Dispatch {
                    name: name.unwrap_or_default().to_string(),
                },
            },
            Some(OpCode::Heartbeat) => GatewayEvent::HeartbeatRequest,
            Some(OpCode::HeartbeatAck) => GatewayEvent::HeartbeatAck,
            Some(OpCode::InvalidSession) => GatewayEvent::InvalidSession {
                resumable: env.d.as_bool().unwrap_or(false),
            },
            Some(OpCode::Reconnect) => GatewayEvent::Reconnect,
            _ => GatewayEvent::Other(env.op),
        };

        Ok(Self {
            sequence: env.s,
            event,
        })
    }
}

/// Anything that can arrive on the engine's socket.
///
/// A tunnelled socket carries relay control frames (tagged with `type`)
/// interleaved with ordinary gateway frames.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Relay(RelayReply),
    Gateway(GatewayFrame),
}

impl InboundFrame {
    /// Decode a text frame, telling relay replies apart from gateway frames.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let is_relay = value.get("op").is_none()
            && value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|tag| RelayReply::TAGS.contains(&tag));
        if is_relay {
            return Ok(InboundFrame::Relay(serde_json::from_value(value)?));
        }

        let env: Envelope = serde_json::from_value(value)?;
        GatewayFrame::from_envelope(env).map(InboundFrame::Gateway)
    }
}

/// Client identification properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: "Windows".into(),
            browser: "Chrome".into(),
            device: String::new(),
        }
    }
}

/// Identify payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    pub token: String,
    pub properties: ConnectionProperties,
    pub presence: Presence,
}

impl Identify {
    /// Identify payload with the default connection properties.
    pub fn new(token: impl Into<String>, presence: Presence) -> Self {
        Self {
            token: token.into(),
            properties: ConnectionProperties::default(),
            presence,
        }
    }
}

/// Frames sent by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Identify(Identify),
    /// Heartbeat carrying the last seen sequence, or null.
    Heartbeat(Option<u64>),
    PresenceUpdate(Presence),
}

impl ClientFrame {
    /// Opcode this frame is sent under.
    pub fn op(&self) -> OpCode {
        match self {
            ClientFrame::Identify(_) => OpCode::Identify,
            ClientFrame::Heartbeat(_) => OpCode::Heartbeat,
            ClientFrame::PresenceUpdate(_) => OpCode::PresenceUpdate,
        }
    }

    /// Encode as `{op, d}` JSON.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for ClientFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut frame = serializer.serialize_struct("ClientFrame", 2)?;
        frame.serialize_field("op", &(self.op() as u8))?;
        match self {
            ClientFrame::Identify(identify) => frame.serialize_field("d", identify)?,
            ClientFrame::Heartbeat(seq) => frame.serialize_field("d", seq)?,
            ClientFrame::PresenceUpdate(presence) => frame.serialize_field("d", presence)?,
        }
        frame.end()
    }
}

/// What a transport closure means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Normal closure; go offline without retrying.
    Clean,
    /// The credential was rejected; never retry automatically.
    AuthenticationFailed,
    /// Retry only after the extended cooldown.
    RateLimited,
    /// Retry after the fixed reconnect delay.
    Retry,
}

impl CloseDisposition {
    /// Classify a close code. `None` means the transport dropped without one.
    pub fn classify(code: Option<u16>) -> Self {
        match code {
            Some(NORMAL_CLOSURE) => CloseDisposition::Clean,
            Some(code) => match CloseCode::try_from(code) {
                Ok(CloseCode::AuthenticationFailed) => CloseDisposition::AuthenticationFailed,
                Ok(CloseCode::RateLimited) => CloseDisposition::RateLimited,
                _ => CloseDisposition::Retry,
            },
            None => CloseDisposition::Retry,
        }
    }
}

/// Error decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is missing field `{0}`")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Activity;
    use crate::session::PresenceStatus;

    fn gateway(text: &str) -> GatewayFrame {
        match InboundFrame::parse(text).unwrap() {
            InboundFrame::Gateway(frame) => frame,
            other => panic!("expected gateway frame, got {other:?}"),
        }
    }

    #[test]
    fn parse_hello() {
        let frame = gateway(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#);
        assert_eq!(frame.sequence, None);
        assert_eq!(
            frame.event,
            GatewayEvent::Hello {
                heartbeat_interval: Duration::from_millis(41250)
            }
        );
    }

    #[test]
    fn hello_without_interval_is_an_error() {
        assert!(matches!(
            InboundFrame::parse(r#"{"op":10,"d":{}}"#),
            Err(FrameError::MissingField("heartbeat_interval"))
        ));
    }

    #[test]
    fn parse_ready_with_profile() {
        let frame = gateway(
            r#"{"op":0,"s":1,"t":"READY","d":{"v":10,"user":{"id":"42","username":"pixel","global_name":"Pixel","accent_color":255}}}"#,
        );
        assert_eq!(frame.sequence, Some(1));
        let GatewayEvent::Ready(profile) = frame.event else {
            panic!("expected ready");
        };
        assert_eq!(profile.id, "42");
        assert_eq!(profile.display_name(), "Pixel");
        assert_eq!(profile.accent_color, Some(255));
    }

    #[test]
    fn parse_other_dispatch_and_control_ops() {
        assert_eq!(
            gateway(r#"{"op":0,"s":7,"t":"SESSIONS_REPLACE","d":[]}"#).event,
            GatewayEvent::Dispatch {
                name: "SESSIONS_REPLACE".into()
            }
        );
        assert_eq!(gateway(r#"{"op":1,"d":null}"#).event, GatewayEvent::HeartbeatRequest);
        assert_eq!(gateway(r#"{"op":11}"#).event, GatewayEvent::HeartbeatAck);
        assert_eq!(gateway(r#"{"op":7,"d":null}"#).event, GatewayEvent::Reconnect);
        assert_eq!(
            gateway(r#"{"op":9,"d":true}"#).event,
            GatewayEvent::InvalidSession { resumable: true }
        );
        assert_eq!(gateway(r#"{"op":99}"#).event, GatewayEvent::Other(99));
    }

    #[test]
    fn relay_frames_are_distinguished() {
        assert_eq!(
            InboundFrame::parse(r#"{"type":"RELAY_READY"}"#).unwrap(),
            InboundFrame::Relay(RelayReply::RelayReady)
        );
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"RELAY_ERROR","error":"timeout"}"#).unwrap(),
            InboundFrame::Relay(RelayReply::RelayError { .. })
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"type":"SOMETHING"}"#).is_err());
    }

    #[test]
    fn heartbeat_wire_shape() {
        assert_eq!(
            ClientFrame::Heartbeat(None).to_json().unwrap(),
            r#"{"op":1,"d":null}"#
        );
        assert_eq!(
            ClientFrame::Heartbeat(Some(12)).to_json().unwrap(),
            r#"{"op":1,"d":12}"#
        );
    }

    #[test]
    fn identify_wire_shape() {
        let presence = Presence::new(
            PresenceStatus::Online,
            vec![Activity::custom_status("hi", None)],
        );
        let json: serde_json::Value = serde_json::from_str(
            &ClientFrame::Identify(Identify::new("tok", presence))
                .to_json()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(json["op"], 2);
        assert_eq!(json["d"]["token"], "tok");
        assert_eq!(json["d"]["properties"]["os"], "Windows");
        assert_eq!(json["d"]["presence"]["status"], "online");
        assert_eq!(json["d"]["presence"]["activities"][0]["state"], "hi");
    }

    #[test]
    fn presence_update_uses_op_3() {
        let presence = Presence::new(PresenceStatus::Idle, vec![]);
        let json: serde_json::Value =
            serde_json::from_str(&ClientFrame::PresenceUpdate(presence).to_json().unwrap())
                .unwrap();
        assert_eq!(json["op"], 3);
        assert_eq!(json["d"]["status"], "idle");
    }

    #[test]
    fn close_classification() {
        assert_eq!(CloseDisposition::classify(Some(1000)), CloseDisposition::Clean);
        assert_eq!(
            CloseDisposition::classify(Some(4004)),
            CloseDisposition::AuthenticationFailed
        );
        assert_eq!(
            CloseDisposition::classify(Some(4008)),
            CloseDisposition::RateLimited
        );
        assert_eq!(CloseDisposition::classify(Some(4000)), CloseDisposition::Retry);
        assert_eq!(CloseDisposition::classify(Some(1006)), CloseDisposition::Retry);
        assert_eq!(CloseDisposition::classify(None), CloseDisposition::Retry);
    }
}
