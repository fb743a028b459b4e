//! Heartbeat keepalive.
//!
//! One beat goes out as soon as the heartbeat starts; after that every tick
//! first checks that the previous beat was acknowledged. An unacknowledged
//! beat means the connection is dead.

use beacon_core::ClientFrame;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Outcome of a heartbeat tick.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatTick {
    /// Send this frame.
    Beat(ClientFrame),
    /// The previous beat was never acknowledged.
    Missed,
}

/// Heartbeat timer plus acknowledgement tracking for one transport.
#[derive(Debug, Default)]
pub struct Heartbeat {
    timer: Option<Interval>,
    awaiting_ack: bool,
    sequence: Option<u64>,
}

impl Heartbeat {
    /// A stopped heartbeat.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start beating every `period`, replacing any running timer.
    ///
    /// Returns the immediate first beat.
    pub fn start(&mut self, period: Duration) -> ClientFrame {
        self.stop();
        let mut timer = time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        self.beat()
    }

    /// Drop the timer. Nothing ticks until the next `start`.
    pub fn stop(&mut self) {
        self.timer = None;
        self.awaiting_ack = false;
    }

    /// Whether a timer is armed.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Record the latest sequence number seen on the stream.
    pub fn observe(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
    }

    /// Answer a server request for an immediate beat.
    ///
    /// The next regular tick moves a full period out, so the ack for this
    /// beat gets as long to arrive as any other.
    pub fn request(&mut self) -> ClientFrame {
        if let Some(timer) = self.timer.as_mut() {
            timer.reset();
        }
        self.beat()
    }

    fn beat(&mut self) -> ClientFrame {
        self.awaiting_ack = true;
        ClientFrame::Heartbeat(self.sequence)
    }

    /// The server acknowledged the last beat.
    pub fn acknowledge(&mut self) {
        self.awaiting_ack = false;
    }

    /// Wait for the next tick. Never completes while stopped.
    pub async fn tick(&mut self) -> HeartbeatTick {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }

        if self.awaiting_ack {
            self.stop();
            HeartbeatTick::Missed
        } else {
            HeartbeatTick::Beat(self.beat())
        }
    }
}
