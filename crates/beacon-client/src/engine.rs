//! Shared engine dependencies.

use crate::event::{EventStream, Shared};
use crate::relay::{RelayBridge, WsRelay};
use crate::rest::{DirectRest, HttpRest, RestError};
use crate::session::Session;
use crate::settings::EngineSettings;
use crate::transport::{Connector, WsConnector};
use beacon_core::SessionConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything sessions share: settings, connector, relay, and the direct REST client.
///
/// Cheap to clone. Sessions never mutate any of it.
#[derive(Clone)]
pub struct Engine {
    pub(crate) settings: Arc<EngineSettings>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) relay: Arc<dyn RelayBridge>,
    pub(crate) rest: Arc<dyn DirectRest>,
}

impl Engine {
    /// Start from default settings and the real network stack.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Timing and endpoint settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Relay websocket address, if one is configured.
    pub fn relay_address(&self) -> Option<&str> {
        self.relay.address()
    }

    /// Create a session for `config`. Nothing connects until [`Session::connect`].
    pub fn session(&self, config: SessionConfig) -> (Session, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(Arc::new(config), self.clone(), Shared::new(tx));
        (session, rx)
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    settings: EngineSettings,
    relay_address: Option<String>,
    connector: Option<Arc<dyn Connector>>,
    relay: Option<Arc<dyn RelayBridge>>,
    rest: Option<Arc<dyn DirectRest>>,
}

impl EngineBuilder {
    /// Replace the default settings.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Relay websocket address used for tunnels and forwarded requests.
    pub fn relay_address(mut self, address: Option<String>) -> Self {
        self.relay_address = address;
        self
    }

    /// Use a custom transport connector.
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Use a custom relay bridge instead of one built from `relay_address`.
    pub fn relay(mut self, relay: impl RelayBridge) -> Self {
        self.relay = Some(Arc::new(relay));
        self
    }

    /// Use a custom client for direct requests.
    pub fn rest(mut self, rest: impl DirectRest) -> Self {
        self.rest = Some(Arc::new(rest));
        self
    }

    /// Build the engine. Fails only if the default HTTP client cannot be created.
    pub fn build(self) -> Result<Engine, RestError> {
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector),
        };
        let rest: Arc<dyn DirectRest> = match self.rest {
            Some(rest) => rest,
            None => Arc::new(HttpRest::new(self.settings.request_timeout)?),
        };
        let relay: Arc<dyn RelayBridge> = match self.relay {
            Some(relay) => relay,
            None => Arc::new(WsRelay::new(
                self.relay_address,
                connector.clone(),
                self.settings.relay_timeout,
            )),
        };

        Ok(Engine {
            settings: Arc::new(self.settings),
            connector,
            relay,
            rest,
        })
    }
}
