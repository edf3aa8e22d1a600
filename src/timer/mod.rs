//! Countdown timers.
//!
//! [`Timer`] is the per-timer state machine; [`TimerEngine`] applies
//! transitions to timers held in the store and runs the expiry ticker.

pub mod engine;
pub mod state;

pub use engine::{DEFAULT_TICK, TimerEngine};
pub use state::{Timer, TimerState};
