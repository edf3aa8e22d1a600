//! Game-state store.
//!
//! [`GameStore`] owns the configuration and all live state behind one
//! mutex. Every mutator takes the guard once and never holds it across an
//! `.await`; snapshot reads assemble the whole view under a single guard.
//!
//! Configuration swaps go through a separate swap guard held across
//! persist and swap, so concurrent `use config` requests cannot leave the
//! document on disk and the document in memory diverged.

pub mod state;

pub use state::{CONSOLE_CATEGORY, Device, Event, GameState, Snapshot};

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::loader::ConfigLoader;
use crate::config::schema::GameConfig;
use crate::error::{ConfigError, StoreError, TimerError};
use crate::gateway::FRONT_END;
use crate::message::TimeReport;
use crate::timer::{Timer, TimerState};

/// Result of merging status fields into a device.
#[derive(Debug, Clone)]
pub struct MergedStatus {
    /// Status map before the merge
    pub previous: Map<String, Value>,
    /// Device after the merge
    pub device: Device,
}

/// Shared, authoritative game state.
#[derive(Debug)]
pub struct GameStore {
    state: Mutex<GameState>,
    swap_guard: Mutex<()>,
    console_id: String,
    loader: Option<ConfigLoader>,
}

impl GameStore {
    /// Creates a store for `config` with the default console id
    /// (`front-end`) and no persistence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a duration is malformed.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        Self::with_console(config, FRONT_END)
    }

    /// Creates a store whose console entry is named `console_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a duration is malformed.
    pub fn with_console(config: GameConfig, console_id: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            state: Mutex::new(GameState::from_config(config, console_id)?),
            swap_guard: Mutex::new(()),
            console_id: console_id.to_string(),
            loader: None,
        })
    }

    /// Persists accepted configurations through `loader`.
    #[must_use]
    pub fn with_persistence(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Console device id.
    #[must_use]
    pub fn console_id(&self) -> &str {
        &self.console_id
    }

    fn lock(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Consistent point-in-time view of everything.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        Snapshot::capture(&self.lock(), now)
    }

    /// Configuration currently in effect.
    #[must_use]
    pub fn config(&self) -> GameConfig {
        self.lock().config.clone()
    }

    /// Configuration currently in effect, as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn config_document(&self) -> Result<Value, serde_json::Error> {
        let config = self.config();
        serde_json::to_value(config)
    }

    /// Device or console by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeviceNotFound`] on a miss.
    pub fn device(&self, id: &str) -> Result<Device, StoreError> {
        self.lock().device(id).cloned()
    }

    /// Event by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] on a miss.
    pub fn event(&self, id: &str) -> Result<Event, StoreError> {
        self.lock()
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::EventNotFound(id.to_string()))
    }

    /// Timer report by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TimerNotFound`] on a miss.
    pub fn timer(&self, id: &str, now: Instant) -> Result<TimeReport, StoreError> {
        self.lock()
            .timers
            .get(id)
            .map(|t| t.report(now))
            .ok_or_else(|| StoreError::TimerNotFound(id.to_string()))
    }

    // ========================================================================
    // Device Mutators
    // ========================================================================

    /// Merges `fields` into a device's status and marks it connected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeviceNotFound`] on a miss.
    pub fn merge_device_status(
        &self,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<MergedStatus, StoreError> {
        let mut state = self.lock();
        let device = state.device_mut(id)?;
        let previous = device.status.clone();
        device.status.extend(fields);
        device.connected = true;
        Ok(MergedStatus {
            previous,
            device: device.clone(),
        })
    }

    /// Sets a device's connected flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeviceNotFound`] on a miss.
    pub fn set_device_connection(&self, id: &str, connected: bool) -> Result<Device, StoreError> {
        let mut state = self.lock();
        let device = state.device_mut(id)?;
        device.connected = connected;
        Ok(device.clone())
    }

    // ========================================================================
    // Event Mutators
    // ========================================================================

    /// Sets an event's completed flag. Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] on a miss.
    pub fn set_event_status(&self, id: &str, completed: bool) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let event = state
            .events
            .get_mut(id)
            .ok_or_else(|| StoreError::EventNotFound(id.to_string()))?;
        let changed = event.completed != completed;
        event.completed = completed;
        Ok(changed)
    }

    /// Completes an open event. Returns `false` if it was already completed,
    /// in which case nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] on a miss.
    pub fn complete_event(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let event = state
            .events
            .get_mut(id)
            .ok_or_else(|| StoreError::EventNotFound(id.to_string()))?;
        if event.completed {
            return Ok(false);
        }
        event.completed = true;
        Ok(true)
    }

    // ========================================================================
    // Timer Mutators
    // ========================================================================

    /// Overwrites a timer's state and remaining duration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TimerNotFound`] on a miss.
    pub fn set_timer(
        &self,
        id: &str,
        timer_state: TimerState,
        remaining_ms: u64,
        now: Instant,
    ) -> Result<TimeReport, StoreError> {
        let mut state = self.lock();
        let timer = state.timer_mut(id)?;
        timer.set(timer_state, remaining_ms, now);
        Ok(timer.report(now))
    }

    /// Applies `f` to a timer under the guard.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Store`] on a miss, or whatever `f` returns.
    pub fn update_timer<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Timer) -> Result<R, TimerError>,
    ) -> Result<R, TimerError> {
        let mut state = self.lock();
        let timer = state.timer_mut(id)?;
        f(timer)
    }

    /// Resets a timer to Idle at its initial duration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TimerNotFound`] on a miss.
    pub fn reset_timer(&self, id: &str, now: Instant) -> Result<TimeReport, StoreError> {
        let mut state = self.lock();
        let timer = state.timer_mut(id)?;
        timer.reset();
        Ok(timer.report(now))
    }

    /// Expires every running timer whose time is up; returns their reports.
    pub fn expire_due(&self, now: Instant) -> Vec<TimeReport> {
        let mut state = self.lock();
        state
            .timers
            .values_mut()
            .filter_map(|t| t.expire_if_elapsed(now).then(|| t.report(now)))
            .collect()
    }

    // ========================================================================
    // Configuration Swap
    // ========================================================================

    /// Guard serializing configuration swaps. Held across persist and swap.
    pub fn config_swap_guard(&self) -> MutexGuard<'_, ()> {
        self.swap_guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the configuration: builds the new state, persists the
    /// document (when persistence is configured), then swaps.
    ///
    /// Any failure leaves both the store and the document on disk as they
    /// were.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the new state cannot be
    /// built, or [`ConfigError::PersistFailed`] if the write fails.
    pub fn replace_config(&self, config: GameConfig) -> Result<(), ConfigError> {
        let _swap = self.config_swap_guard();

        let mut next = GameState::from_config(config, &self.console_id)?;
        if let Some(loader) = &self.loader {
            persist_off_worker(loader, &next.config)?;
        } else {
            debug!("no persistence configured, swapping in memory only");
        }

        let mut state = self.lock();
        next.inherit_endpoints(&state);
        let name = next.config.general.name.clone();
        *state = next;
        drop(state);

        info!(name = %name, "configuration replaced");
        Ok(())
    }
}

/// Runs the blocking write through `block_in_place` on a multi-thread
/// runtime so other tasks keep their worker. `block_in_place` panics on a
/// current-thread runtime, so anywhere else the write runs inline.
fn persist_off_worker(loader: &ConfigLoader, config: &GameConfig) -> Result<(), ConfigError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| loader.persist(config))
        }
        _ => loader.persist(config),
    }
}
