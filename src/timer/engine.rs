//! Timer engine.
//!
//! Drives timer transitions requested by handlers and runs the background
//! ticker that expires running timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TimerError;
use crate::gateway::{BusGateway, publish_all};
use crate::message::{MessageKind, Outbound, TimeReport};
use crate::store::GameStore;
use crate::timer::TimerState;

/// Default ticker interval.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Timer transitions over timers owned by a [`GameStore`].
#[derive(Debug)]
pub struct TimerEngine {
    store: Arc<GameStore>,
    tick: Duration,
    cancel: CancellationToken,
}

impl TimerEngine {
    /// Creates an engine with the default tick and its own cancellation token.
    #[must_use]
    pub fn new(store: Arc<GameStore>) -> Self {
        Self {
            store,
            tick: DEFAULT_TICK,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the ticker interval.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Ties the ticker's lifetime to `cancel`.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ticker interval.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// Idle -> Running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] on a lookup miss or invalid transition.
    pub fn start(&self, id: &str) -> Result<TimeReport, TimerError> {
        self.transition(id, |timer, now| timer.start(now))
    }

    /// Running -> Paused.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] on a lookup miss or invalid transition.
    pub fn pause(&self, id: &str) -> Result<TimeReport, TimerError> {
        self.transition(id, |timer, now| timer.pause(now))
    }

    /// Paused -> Running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] on a lookup miss or invalid transition.
    pub fn resume(&self, id: &str) -> Result<TimeReport, TimerError> {
        self.transition(id, |timer, now| timer.resume(now))
    }

    /// Starts an idle timer or resumes a paused one.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] on a lookup miss, or when the timer is
    /// already running or finished.
    pub fn start_or_resume(&self, id: &str) -> Result<TimeReport, TimerError> {
        self.transition(id, |timer, now| match timer.state() {
            TimerState::Idle => timer.start(now),
            _ => timer.resume(now),
        })
    }

    /// Any -> Idle at the initial duration.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Store`] on a lookup miss.
    pub fn reset(&self, id: &str) -> Result<TimeReport, TimerError> {
        let report = self.store.reset_timer(id, Instant::now())?;
        debug!(timer = id, "timer reset");
        Ok(report)
    }

    /// Expires running timers whose time is up.
    pub fn expire_due(&self) -> Vec<TimeReport> {
        self.store.expire_due(Instant::now())
    }

    fn transition(
        &self,
        id: &str,
        apply: impl FnOnce(&mut crate::timer::Timer, Instant) -> Result<(), TimerError>,
    ) -> Result<TimeReport, TimerError> {
        let now = Instant::now();
        let report = self.store.update_timer(id, |timer| {
            apply(timer, now)?;
            Ok(timer.report(now))
        })?;
        debug!(timer = id, state = %report.state, remaining_ms = report.duration, "timer transition");
        Ok(report)
    }

    /// Spawns the ticker: every tick, expired timers are swept and a `time`
    /// message is published to the console for each.
    ///
    /// The task stops when the cancellation token is cancelled.
    pub fn start_ticker(
        self: &Arc<Self>,
        gateway: Arc<dyn BusGateway>,
        identity: String,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.tick);
            loop {
                tokio::select! {
                    () = engine.cancel.cancelled() => {
                        debug!("timer ticker cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let expired = engine.expire_due();
                        if expired.is_empty() {
                            continue;
                        }
                        let messages = expiry_messages(engine.store.console_id(), &identity, &expired);
                        publish_all(gateway.as_ref(), messages).await;
                    }
                }
            }
        })
    }

    /// Stops the ticker.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn expiry_messages(console: &str, identity: &str, expired: &[TimeReport]) -> Vec<Outbound> {
    expired
        .iter()
        .filter_map(|report| {
            info!(timer = %report.id, "timer finished");
            crate::observability::metrics::record_timer_expired();
            Outbound::new(console, identity, MessageKind::Time, report)
                .map_err(|e| warn!(timer = %report.id, error = %e, "failed to encode time message"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{GENERAL_TIMER_ID, GameConfig};
    use crate::gateway::{FRONT_END, MemoryGateway};

    fn engine() -> Arc<TimerEngine> {
        let config = GameConfig::from_value(serde_json::json!({
            "general": {"name": "Escape X", "duration": "00:00:02"},
            "cameras": [],
            "devices": [],
            "timers": [{"id": "timer1", "duration": "00:00:01"}],
            "events": [],
            "hints": {}
        }))
        .unwrap();
        let store = Arc::new(GameStore::new(config).unwrap());
        Arc::new(TimerEngine::new(store))
    }

    #[tokio::test(start_paused = true)]
    async fn start_pause_resume_reset() {
        let engine = engine();
        let started = engine.start(GENERAL_TIMER_ID).unwrap();
        assert_eq!(started.state, TimerState::Running);

        tokio::time::advance(Duration::from_millis(500)).await;
        let paused = engine.pause(GENERAL_TIMER_ID).unwrap();
        assert_eq!(paused.state, TimerState::Paused);
        assert_eq!(paused.duration, 1_500);

        let resumed = engine.start_or_resume(GENERAL_TIMER_ID).unwrap();
        assert_eq!(resumed.state, TimerState::Running);

        let reset = engine.reset(GENERAL_TIMER_ID).unwrap();
        assert_eq!(reset.state, TimerState::Idle);
        assert_eq!(reset.duration, 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_transition_is_reported() {
        let engine = engine();
        let err = engine.pause("timer1").unwrap_err();
        assert!(matches!(err, TimerError::InvalidTransition { action: "pause", .. }));
        assert!(matches!(
            engine.start("ghost").unwrap_err(),
            TimerError::Store(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_expiry_to_console() {
        let engine = engine();
        let gateway = Arc::new(MemoryGateway::new());
        let handle = engine.start_ticker(gateway.clone(), "back-end".to_string());

        engine.start("timer1").unwrap();
        tokio::time::sleep(Duration::from_millis(1_250)).await;

        let published = gateway.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, FRONT_END);
        let message = published[0].message().unwrap();
        assert_eq!(message.kind, "time");
        assert_eq!(
            message.contents,
            serde_json::json!({"id": "timer1", "state": "stateFinished", "duration": 0})
        );

        engine.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_on_cancel() {
        let engine = engine();
        let handle = engine.start_ticker(Arc::new(MemoryGateway::new()), "back-end".into());
        engine.shutdown();
        handle.await.unwrap();
    }
}
