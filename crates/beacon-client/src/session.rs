//! Per-account connection state machine.
//!
//! A [`Session`] is the handle collaborators hold. `connect` spawns one
//! connection task that owns the transport, heartbeat, and rotation for as
//! long as the session runs, reconnecting on failure. All frames for a
//! session are handled on that single task, in arrival order.

use crate::engine::Engine;
use crate::event::{Reporter, SessionUpdate, Shared, lock};
use crate::heartbeat::{Heartbeat, HeartbeatTick};
use crate::rotation::Rotation;
use crate::transport::{Transport, TransportEvent};
use beacon_core::{
    ClientFrame, CloseDisposition, ConnectionState, GatewayEvent, GatewayFrame, Identify,
    InboundFrame, LogEntry, NORMAL_CLOSURE, Presence, RelayReply, RelayRequest, SessionConfig,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

/// Close code used when dropping a transport in order to reconnect.
const RECONNECT_CLOSURE: u16 = 4000;

/// Handle to one account's presence session.
pub struct Session {
    pub(crate) config: Arc<SessionConfig>,
    pub(crate) engine: Engine,
    pub(crate) shared: Arc<Mutex<Shared>>,
    task: Mutex<TaskSlot>,
}

#[derive(Default)]
struct TaskSlot {
    running: Option<Running>,
    /// A disconnected task still closing its transport.
    retiring: Option<JoinHandle<()>>,
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
enum Command {
    Disconnect,
}

impl Session {
    pub(crate) fn new(config: Arc<SessionConfig>, engine: Engine, shared: Arc<Mutex<Shared>>) -> Self {
        Self {
            config,
            engine,
            shared,
            task: Mutex::new(TaskSlot::default()),
        }
    }

    /// Account label from the config.
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Last reported connection state.
    pub fn state(&self) -> ConnectionState {
        lock(&self.shared).state
    }

    /// Start the session. A no-op while a connection task is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut slot = self.slot();
        if let Some(running) = &slot.running {
            if !running.handle.is_finished() {
                tracing::debug!("Session {} is already running", self.config.label);
                return;
            }
        }
        slot.running = None;
        let previous = slot.retiring.take();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.generation
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection {
            config: self.config.clone(),
            engine: self.engine.clone(),
            reporter: self.reporter_for(generation),
            commands: rx,
        };

        let handle = tokio::spawn(async move {
            // The previous transport must be gone before a new one opens
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            connection.run().await;
        });
        slot.running = Some(Running {
            commands: tx,
            handle,
        });
    }

    /// Stop the session and report `Offline` immediately.
    ///
    /// Safe in any state; a no-op when already offline with nothing running.
    pub fn disconnect(&self) {
        let live = {
            let mut slot = self.slot();
            match slot.running.take() {
                Some(running) => {
                    let live = !running.handle.is_finished();
                    let _ = running.commands.send(Command::Disconnect);
                    slot.retiring = Some(running.handle);
                    live
                }
                None => false,
            }
        };

        let mut shared = lock(&self.shared);
        if !live && shared.state == ConnectionState::Offline {
            return;
        }
        shared.generation += 1;
        shared.emit(
            ConnectionState::Offline,
            Some(LogEntry::info("Disconnected")),
            None,
        );
        tracing::info!("Session {} disconnected", self.config.label);
    }

    /// Wait until a disconnected connection task has released its transport.
    pub async fn closed(&self) {
        let retiring = self.slot().retiring.take();
        if let Some(handle) = retiring {
            let _ = handle.await;
        }
    }

    /// A reporter bound to whatever generation is current.
    pub(crate) fn reporter(&self) -> Reporter {
        let generation = lock(&self.shared).generation;
        self.reporter_for(generation)
    }

    fn reporter_for(&self, generation: u64) -> Reporter {
        let prefix = self
            .config
            .proxy
            .as_ref()
            .map(|p| p.network_label().to_string());
        Reporter::new(self.shared.clone(), generation, prefix)
    }

    fn slot(&self) -> MutexGuard<'_, TaskSlot> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How one connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    /// Disconnect requested, or the handle went away.
    Stopped,
    /// The remote side closed normally.
    Closed,
    /// The credential was rejected.
    Rejected,
    Retry(Duration),
}

enum Step {
    Stop,
    Wire(Option<TransportEvent>),
    Heartbeat(HeartbeatTick),
    Rotate(usize),
}

/// Per-transport state, dropped with the transport.
struct Link {
    transport: Transport,
    heartbeat: Heartbeat,
    rotation: Option<Rotation>,
}

impl Link {
    fn send(&self, frame: &ClientFrame) {
        match frame.to_json() {
            Ok(text) => {
                if !self.transport.send(text) {
                    tracing::debug!("Dropping {:?} frame, transport is gone", frame.op());
                }
            }
            Err(e) => tracing::warn!("Could not encode {:?} frame: {}", frame.op(), e),
        }
    }

    fn halt(&mut self) {
        self.heartbeat.stop();
        if let Some(rotation) = self.rotation.as_mut() {
            rotation.disarm();
        }
    }

    fn shutdown(&mut self, code: u16) {
        self.halt();
        self.transport.close(code);
    }
}

async fn next_rotation(rotation: &mut Option<Rotation>) -> Option<usize> {
    match rotation {
        Some(rotation) => rotation.tick().await,
        None => std::future::pending().await,
    }
}

struct Connection {
    config: Arc<SessionConfig>,
    engine: Engine,
    reporter: Reporter,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Connection {
    async fn run(mut self) {
        loop {
            let delay = match self.attempt().await {
                Ended::Stopped | Ended::Rejected => return,
                Ended::Closed => {
                    self.reporter.transition(
                        ConnectionState::Offline,
                        LogEntry::info("Gateway closed the connection"),
                    );
                    return;
                }
                Ended::Retry(delay) => delay,
            };

            tokio::select! {
                biased;
                _ = self.commands.recv() => return,
                _ = time::sleep(delay) => {}
            }
            if !self.reporter.is_current() {
                return;
            }
        }
    }

    async fn attempt(&mut self) -> Ended {
        let gateway = self.engine.settings.gateway_url.clone();
        let (url, handshake) = match (&self.config.proxy, self.engine.relay.address()) {
            (Some(proxy), Some(relay)) => {
                self.reporter.transition(
                    ConnectionState::Connecting,
                    LogEntry::info(format!(
                        "Routing through relay via proxy [{}]",
                        proxy.display_name()
                    )),
                );
                let handshake = RelayRequest::InitProxy {
                    target: gateway,
                    proxy: proxy.params(),
                };
                (relay.to_string(), Some(handshake))
            }
            (Some(proxy), None) => {
                self.reporter.transition(
                    ConnectionState::Connecting,
                    LogEntry::error(format!(
                        "Proxy [{}] selected but no relay address is configured; \
                         connecting directly from the local network identity",
                        proxy.display_name()
                    )),
                );
                (gateway, None)
            }
            (None, _) => {
                self.reporter.transition(
                    ConnectionState::Connecting,
                    LogEntry::info("Establishing direct gateway link"),
                );
                (gateway, None)
            }
        };

        let opened = tokio::select! {
            biased;
            _ = self.commands.recv() => return Ended::Stopped,
            opened = self.engine.connector.open(&url) => opened,
        };
        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => return self.retry(format!("Connection error: {e}")),
        };

        if let Some(handshake) = handshake {
            match serde_json::to_string(&handshake) {
                Ok(text) => {
                    self.reporter
                        .log(LogEntry::debug("Relay handshake: sending proxy parameters"));
                    transport.send(text);
                }
                Err(e) => return self.retry(format!("Could not encode relay handshake: {e}")),
            }
        }

        let mut link = Link {
            transport,
            heartbeat: Heartbeat::new(),
            rotation: self.config.rotation().map(Rotation::new),
        };

        loop {
            let step = tokio::select! {
                biased;
                _ = self.commands.recv() => Step::Stop,
                event = link.transport.recv() => Step::Wire(event),
                tick = link.heartbeat.tick() => Step::Heartbeat(tick),
                Some(cursor) = next_rotation(&mut link.rotation) => Step::Rotate(cursor),
            };

            let ended = match step {
                Step::Stop => {
                    link.shutdown(NORMAL_CLOSURE);
                    Some(Ended::Stopped)
                }
                Step::Wire(Some(TransportEvent::Text(text))) => self.on_frame(&text, &mut link),
                Step::Wire(Some(TransportEvent::Closed { code, reason })) => {
                    link.halt();
                    Some(self.on_close(code, &reason))
                }
                Step::Wire(Some(TransportEvent::Failed(reason))) => {
                    link.halt();
                    Some(self.retry(format!("Connection error: {reason}")))
                }
                Step::Wire(None) => {
                    link.halt();
                    Some(self.on_close(None, "transport dropped"))
                }
                Step::Heartbeat(HeartbeatTick::Beat(frame)) => {
                    link.send(&frame);
                    None
                }
                Step::Heartbeat(HeartbeatTick::Missed) => {
                    link.shutdown(RECONNECT_CLOSURE);
                    Some(self.retry("Heartbeat was not acknowledged; connection presumed dead"))
                }
                Step::Rotate(cursor) => {
                    self.rotate(cursor, &link);
                    None
                }
            };

            if let Some(ended) = ended {
                return ended;
            }
        }
    }

    fn on_frame(&self, text: &str, link: &mut Link) -> Option<Ended> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Session {}: ignoring frame: {}", self.config.label, e);
                return None;
            }
        };

        match frame {
            InboundFrame::Relay(RelayReply::RelayReady) => {
                self.reporter
                    .log(LogEntry::success("Relay tunnel established"));
                None
            }
            InboundFrame::Relay(RelayReply::RelayError { error }) => {
                link.shutdown(RECONNECT_CLOSURE);
                Some(self.retry(format!("Relay failed: {error}")))
            }
            InboundFrame::Relay(RelayReply::RestResult { .. }) => {
                tracing::debug!("Session {}: stray REST_RESULT on tunnel", self.config.label);
                None
            }
            InboundFrame::Gateway(frame) => self.on_gateway(frame, link),
        }
    }

    fn on_gateway(&self, frame: GatewayFrame, link: &mut Link) -> Option<Ended> {
        if let Some(sequence) = frame.sequence {
            link.heartbeat.observe(sequence);
        }

        match frame.event {
            GatewayEvent::Hello { heartbeat_interval } => {
                let beat = link.heartbeat.start(heartbeat_interval);
                link.send(&beat);

                let cursor = link.rotation.as_ref().map_or(0, Rotation::cursor);
                let presence = Presence::for_session(&self.config, cursor);
                link.send(&ClientFrame::Identify(Identify::new(
                    self.config.token.expose(),
                    presence,
                )));
                self.reporter.log(LogEntry::debug(format!(
                    "Hello received, heartbeat every {}ms; identifying",
                    heartbeat_interval.as_millis()
                )));
                None
            }
            GatewayEvent::Ready(profile) => {
                let message = format!("Authorized as {}", profile.display_name());
                self.reporter.emit(
                    Some(ConnectionState::Online),
                    Some(LogEntry::success(message)),
                    Some(SessionUpdate::Profile(profile)),
                );
                if let Some(rotation) = link.rotation.as_mut() {
                    rotation.mark_updated();
                    if rotation.arm(self.engine.settings.settle_delay) {
                        self.reporter.log(LogEntry::debug(format!(
                            "Rotation armed, every {}s",
                            rotation.period().as_secs()
                        )));
                    }
                }
                None
            }
            GatewayEvent::HeartbeatRequest => {
                let beat = link.heartbeat.request();
                link.send(&beat);
                None
            }
            GatewayEvent::HeartbeatAck => {
                link.heartbeat.acknowledge();
                None
            }
            GatewayEvent::InvalidSession { .. } => {
                link.shutdown(RECONNECT_CLOSURE);
                Some(self.retry("Session invalidated by gateway"))
            }
            GatewayEvent::Reconnect => {
                link.shutdown(RECONNECT_CLOSURE);
                let delay = self.engine.settings.reconnect_delay;
                self.reporter.transition(
                    ConnectionState::Connecting,
                    LogEntry::info(format!(
                        "Gateway requested a reconnect; reconnecting in {}s",
                        delay.as_secs()
                    )),
                );
                Some(Ended::Retry(delay))
            }
            GatewayEvent::Dispatch { name } => {
                tracing::trace!("Session {}: dispatch {}", self.config.label, name);
                None
            }
            GatewayEvent::Other(op) => {
                tracing::debug!("Session {}: unhandled op {}", self.config.label, op);
                None
            }
        }
    }

    fn on_close(&self, code: Option<u16>, reason: &str) -> Ended {
        let settings = &self.engine.settings;
        let described = match code {
            Some(code) if reason.is_empty() => format!("code {code}"),
            Some(code) => format!("code {code}: {reason}"),
            None => reason.to_string(),
        };

        match CloseDisposition::classify(code) {
            CloseDisposition::Clean => Ended::Closed,
            CloseDisposition::AuthenticationFailed => {
                self.reporter.transition(
                    ConnectionState::Error,
                    LogEntry::error(format!(
                        "Authentication failed ({described}); token rejected, not reconnecting"
                    )),
                );
                Ended::Rejected
            }
            CloseDisposition::RateLimited => {
                let cooldown = settings.rate_limit_cooldown;
                self.reporter.transition(
                    ConnectionState::Error,
                    LogEntry::error(format!(
                        "Rate limited by gateway ({described}); cooling down for {}s",
                        cooldown.as_secs()
                    )),
                );
                Ended::Retry(cooldown)
            }
            CloseDisposition::Retry => self.retry(format!("Connection closed ({described})")),
        }
    }

    /// Report `Error` and schedule the fixed-delay reconnect.
    fn retry(&self, cause: impl Into<String>) -> Ended {
        let delay = self.engine.settings.reconnect_delay;
        self.reporter.transition(
            ConnectionState::Error,
            LogEntry::error(format!(
                "{}; reconnecting in {}s",
                cause.into(),
                delay.as_secs()
            )),
        );
        Ended::Retry(delay)
    }

    fn rotate(&self, cursor: usize, link: &Link) {
        let presence = Presence::for_session(&self.config, cursor);
        let text = presence
            .activities
            .first()
            .and_then(|a| a.state.clone())
            .unwrap_or_default();
        link.send(&ClientFrame::PresenceUpdate(presence));
        self.reporter.emit(
            None,
            Some(LogEntry::debug(format!("Status rotated to #{cursor}: {text}"))),
            Some(SessionUpdate::RotationIndex(cursor)),
        );
    }
}
