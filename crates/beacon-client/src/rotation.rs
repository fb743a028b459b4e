//! Rotation scheduler.

use crate::settings::{RETICK_GUARD, ROTATION_FLOOR};
use beacon_core::RotationConfig;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Cycles a cursor through a status list while armed.
#[derive(Debug)]
pub struct Rotation {
    len: usize,
    period: Duration,
    cursor: usize,
    timer: Option<Interval>,
    last_update: Option<Instant>,
}

impl Rotation {
    /// Unarmed rotation starting at the first status.
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            len: config.statuses.len(),
            period: effective_period(config.interval_secs),
            cursor: 0,
            timer: None,
            last_update: None,
        }
    }

    /// Index of the status currently shown.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Tick period after the floor is applied.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether ticks are scheduled.
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Note that a presence carrying the current cursor just went out.
    pub fn mark_updated(&mut self) {
        self.last_update = Some(Instant::now());
    }

    /// Start ticking after `delay`. Lists shorter than two never arm.
    pub fn arm(&mut self, delay: Duration) -> bool {
        self.disarm();
        if self.len < 2 {
            return false;
        }
        let start = Instant::now() + delay + self.period;
        let mut timer = time::interval_at(start, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        true
    }

    /// Stop ticking. The cursor is kept.
    pub fn disarm(&mut self) {
        self.timer = None;
    }

    /// Wait for the next tick and advance the cursor.
    ///
    /// Returns `None` when the tick is dropped by the re-tick guard. Never
    /// completes while disarmed.
    pub async fn tick(&mut self) -> Option<usize> {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }

        if let Some(last) = self.last_update {
            if last.elapsed() < RETICK_GUARD {
                tracing::debug!("Dropping rotation tick {:?} after last update", last.elapsed());
                return None;
            }
        }

        self.cursor = (self.cursor + 1) % self.len;
        self.last_update = Some(Instant::now());
        Some(self.cursor)
    }
}

/// The interval actually used for a requested number of seconds.
pub fn effective_period(interval_secs: u64) -> Duration {
    Duration::from_secs(interval_secs).max(ROTATION_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(statuses: &[&str], interval_secs: u64) -> RotationConfig {
        RotationConfig::new(statuses.iter().map(|s| s.to_string()).collect(), interval_secs)
    }

    #[test]
    fn floor_applies() {
        assert_eq!(effective_period(5), ROTATION_FLOOR);
        assert_eq!(effective_period(0), ROTATION_FLOOR);
        assert_eq!(effective_period(90), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn single_entry_never_arms() {
        let mut rotation = Rotation::new(&config(&["only"], 20));
        assert!(!rotation.arm(Duration::ZERO));
        assert!(!rotation.is_armed());
        assert!(time::timeout(Duration::from_secs(120), rotation.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_wrap_modulo_length() {
        let mut rotation = Rotation::new(&config(&["A", "B", "C"], 15));
        rotation.mark_updated();
        assert!(rotation.arm(Duration::ZERO));

        let mut visited = Vec::new();
        for _ in 0..3 {
            visited.push(rotation.tick().await.unwrap());
        }
        assert_eq!(visited, vec![1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_respects_floor_and_delay() {
        let mut rotation = Rotation::new(&config(&["A", "B"], 5));
        let armed = Instant::now();
        rotation.arm(Duration::from_secs(2));
        rotation.tick().await;
        assert_eq!(armed.elapsed(), Duration::from_secs(17));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_drops_tick_right_after_update() {
        let mut rotation = Rotation::new(&config(&["A", "B"], 15));
        rotation.arm(Duration::ZERO);
        time::sleep(Duration::from_secs(10)).await;
        rotation.mark_updated();
        assert_eq!(rotation.tick().await, None);
        assert_eq!(rotation.cursor(), 0);
        assert_eq!(rotation.tick().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_stops_ticks() {
        let mut rotation = Rotation::new(&config(&["A", "B"], 15));
        rotation.arm(Duration::ZERO);
        rotation.disarm();
        assert!(time::timeout(Duration::from_secs(60), rotation.tick()).await.is_err());
    }
}
