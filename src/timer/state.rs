//! Timer state representation.
//!
//! A [`Timer`] is a countdown with an explicit lifecycle. Remaining time is
//! never decremented by a loop; it is recomputed from the instant the timer
//! last started running, so reading a timer is as cheap as reading a field.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::TimerError;
use crate::message::TimeReport;

/// Lifecycle state of a timer.
///
/// ```text
/// Idle --start--> Running --pause--> Paused --resume--> Running
/// Running --expire--> Finished
/// any --reset--> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerState {
    /// Not started; remaining equals the initial duration.
    #[serde(rename = "stateIdle")]
    Idle,
    /// Counting down.
    #[serde(rename = "stateActive")]
    Running,
    /// Frozen with time left.
    #[serde(rename = "statePaused")]
    Paused,
    /// Expired or stopped for good until reset.
    #[serde(rename = "stateFinished")]
    Finished,
}

impl TimerState {
    /// Lowercase state name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A countdown timer owned by the game-state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    id: String,
    state: TimerState,
    initial_ms: u64,
    /// Remaining time as of `started_at` (or frozen when not running).
    remaining_ms: u64,
    started_at: Option<Instant>,
    event: Option<String>,
}

impl Timer {
    /// Creates an idle timer.
    #[must_use]
    pub fn new(id: impl Into<String>, initial_ms: u64, event: Option<String>) -> Self {
        Self {
            id: id.into(),
            state: TimerState::Idle,
            initial_ms,
            remaining_ms: initial_ms,
            started_at: None,
            event,
        }
    }

    /// Timer id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Configured initial duration in milliseconds.
    #[must_use]
    pub const fn initial_ms(&self) -> u64 {
        self.initial_ms
    }

    /// Event this timer is attached to.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Remaining milliseconds at `now`.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> u64 {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started)) => {
                let elapsed = millis(now.saturating_duration_since(started));
                self.remaining_ms.saturating_sub(elapsed)
            }
            _ => self.remaining_ms,
        }
    }

    /// Idle -> Running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidTransition`] from any other state.
    pub fn start(&mut self, now: Instant) -> Result<(), TimerError> {
        self.require(TimerState::Idle, "start")?;
        self.run_from(now);
        Ok(())
    }

    /// Running -> Paused, freezing the remaining time.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidTransition`] unless running.
    pub fn pause(&mut self, now: Instant) -> Result<(), TimerError> {
        self.require(TimerState::Running, "pause")?;
        self.remaining_ms = self.remaining_at(now);
        self.started_at = None;
        self.state = TimerState::Paused;
        Ok(())
    }

    /// Paused -> Running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidTransition`] unless paused.
    pub fn resume(&mut self, now: Instant) -> Result<(), TimerError> {
        self.require(TimerState::Paused, "resume")?;
        self.run_from(now);
        Ok(())
    }

    /// Any -> Idle with the initial duration restored.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.remaining_ms = self.initial_ms;
        self.started_at = None;
    }

    /// Running -> Finished once the remaining time reaches zero.
    ///
    /// Returns `true` if this call expired the timer.
    pub fn expire_if_elapsed(&mut self, now: Instant) -> bool {
        if self.state != TimerState::Running || self.remaining_at(now) > 0 {
            return false;
        }
        self.remaining_ms = 0;
        self.started_at = None;
        self.state = TimerState::Finished;
        true
    }

    /// Overwrites state and remaining time, as reported by a device.
    pub fn set(&mut self, state: TimerState, remaining_ms: u64, now: Instant) {
        self.state = state;
        self.remaining_ms = remaining_ms;
        self.started_at = (state == TimerState::Running).then_some(now);
    }

    /// Wire representation at `now`.
    #[must_use]
    pub fn report(&self, now: Instant) -> TimeReport {
        TimeReport {
            id: self.id.clone(),
            state: self.state,
            duration: self.remaining_at(now),
        }
    }

    fn run_from(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.state = TimerState::Running;
    }

    fn require(&self, required: TimerState, action: &'static str) -> Result<(), TimerError> {
        if self.state == required {
            Ok(())
        } else {
            Err(TimerError::InvalidTransition {
                id: self.id.clone(),
                action,
                state: self.state.name(),
            })
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
