//! Connection engine for beacon.
//!
//! An [`Engine`] holds what every session shares. Each [`Session`] keeps one
//! account's presence live on the gateway: it opens the transport (directly
//! or through the relay), identifies, heartbeats, rotates statuses, and
//! reconnects according to the close code. Progress is reported on the
//! session's own [`EventStream`].

mod engine;
mod event;
mod heartbeat;
mod mutation;
mod relay;
mod rest;
mod rotation;
mod session;
mod settings;
mod transport;

pub use engine::{Engine, EngineBuilder};
pub use event::{EventStream, SessionEvent, SessionUpdate};
pub use heartbeat::{Heartbeat, HeartbeatTick};
pub use mutation::MutationOutcome;
pub use relay::{RelayBridge, RelayError, WsRelay};
pub use rest::{DirectRest, HttpRest, RestError, RestResponse};
pub use rotation::{Rotation, effective_period};
pub use session::Session;
pub use settings::{DEFAULT_API_BASE, EngineSettings, RETICK_GUARD, ROTATION_FLOOR};
pub use transport::{
    Accepted, ChannelConnector, Connector, Outgoing, Peer, Transport, TransportError,
    TransportEvent, WsConnector,
};

