//! Live game state built from a configuration.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tokio::time::Instant;

use crate::config::schema::{GENERAL_TIMER_ID, GameConfig};
use crate::error::{ConfigError, StoreError};
use crate::message::{DeviceStatus, EventStatusEntry, TimeReport};
use crate::timer::Timer;

/// Category given to the operator console entry.
pub const CONSOLE_CATEGORY: &str = "console";

/// A device (or the console) with its live fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Device id; also its bus topic
    pub id: String,
    /// Category from configuration
    pub category: String,
    /// Connectivity as last reported
    pub connected: bool,
    /// Device-owned status fields, merged by ingestion only
    pub status: Map<String, Value>,
    /// Whether the device pushes status without being asked
    pub push_status: bool,
}

impl Device {
    /// Outbound `status` contents for this device.
    #[must_use]
    pub fn report(&self) -> DeviceStatus {
        DeviceStatus {
            id: self.id.clone(),
            connection: self.connected,
            status: self.status.clone(),
        }
    }

    fn console(id: &str) -> Self {
        let mut status = Map::new();
        status.insert("start".into(), json!(0));
        status.insert("stop".into(), json!(0));
        Self {
            id: id.to_string(),
            category: CONSOLE_CATEGORY.to_string(),
            connected: false,
            status,
            push_status: true,
        }
    }
}

/// A puzzle completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event id
    pub id: String,
    /// Operator-facing description
    pub description: String,
    /// Completion flag
    pub completed: bool,
}

impl Event {
    /// Outbound `event status` entry.
    #[must_use]
    pub fn report(&self) -> EventStatusEntry {
        EventStatusEntry {
            id: self.id.clone(),
            status: self.completed,
        }
    }
}

/// Everything the store guards: the configuration plus live fields.
#[derive(Debug, Clone)]
pub struct GameState {
    pub(crate) config: GameConfig,
    pub(crate) console: Device,
    pub(crate) devices: IndexMap<String, Device>,
    pub(crate) events: IndexMap<String, Event>,
    /// Configured timers in order, then `general`.
    pub(crate) timers: IndexMap<String, Timer>,
}

impl GameState {
    /// Builds fresh state: all devices disconnected, events open, timers idle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a timer duration is not
    /// `HH:MM:SS`.
    pub fn from_config(config: GameConfig, console_id: &str) -> Result<Self, ConfigError> {
        let devices = config
            .devices
            .iter()
            .map(|d| {
                let device = Device {
                    id: d.id.clone(),
                    category: d.category().to_string(),
                    connected: false,
                    status: Map::new(),
                    push_status: d.push_status,
                };
                (d.id.clone(), device)
            })
            .collect();

        let events = config
            .events
            .iter()
            .map(|e| {
                let event = Event {
                    id: e.id.clone(),
                    description: e.description.clone(),
                    completed: false,
                };
                (e.id.clone(), event)
            })
            .collect();

        let mut timers = IndexMap::with_capacity(config.timers.len() + 1);
        for t in &config.timers {
            let timer = Timer::new(t.id.clone(), t.duration_ms()?, t.event.clone());
            timers.insert(t.id.clone(), timer);
        }
        timers.insert(
            GENERAL_TIMER_ID.to_string(),
            Timer::new(GENERAL_TIMER_ID, config.general.duration_ms()?, None),
        );

        Ok(Self {
            config,
            console: Device::console(console_id),
            devices,
            events,
            timers,
        })
    }

    /// Carries live endpoint fields over from `previous`.
    ///
    /// The console and every device still present in the new fleet keep
    /// their connectivity and status; events and timers start fresh.
    pub(crate) fn inherit_endpoints(&mut self, previous: &Self) {
        self.console = previous.console.clone();
        for (id, device) in &mut self.devices {
            if let Some(old) = previous.devices.get(id) {
                device.connected = old.connected;
                device.status.clone_from(&old.status);
            }
        }
    }

    /// Device or console by id.
    pub(crate) fn device_mut(&mut self, id: &str) -> Result<&mut Device, StoreError> {
        if self.console.id == id {
            return Ok(&mut self.console);
        }
        self.devices
            .get_mut(id)
            .ok_or_else(|| StoreError::DeviceNotFound(id.to_string()))
    }

    pub(crate) fn device(&self, id: &str) -> Result<&Device, StoreError> {
        if self.console.id == id {
            return Ok(&self.console);
        }
        self.devices
            .get(id)
            .ok_or_else(|| StoreError::DeviceNotFound(id.to_string()))
    }

    pub(crate) fn timer_mut(&mut self, id: &str) -> Result<&mut Timer, StoreError> {
        self.timers
            .get_mut(id)
            .ok_or_else(|| StoreError::TimerNotFound(id.to_string()))
    }
}

/// Point-in-time copy of the whole game state.
///
/// Taken under a single guard acquisition, so devices, timers and events
/// are mutually consistent.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Configuration in effect
    pub config: GameConfig,
    /// Operator console entry
    pub console: Device,
    /// Configured devices in order
    pub devices: Vec<Device>,
    /// Events in order
    pub events: Vec<Event>,
    /// Configured timers in order, then `general`
    pub timers: Vec<TimeReport>,
}

impl Snapshot {
    pub(crate) fn capture(state: &GameState, now: Instant) -> Self {
        Self {
            config: state.config.clone(),
            console: state.console.clone(),
            devices: state.devices.values().cloned().collect(),
            events: state.events.values().cloned().collect(),
            timers: state.timers.values().map(|t| t.report(now)).collect(),
        }
    }

    /// Device or console by id.
    #[must_use]
    pub fn device(&self, id: &str) -> Option<&Device> {
        if self.console.id == id {
            return Some(&self.console);
        }
        self.devices.iter().find(|d| d.id == id)
    }

    /// Timer report by id.
    #[must_use]
    pub fn timer(&self, id: &str) -> Option<&TimeReport> {
        self.timers.iter().find(|t| t.id == id)
    }

    /// Event status entries for every event.
    #[must_use]
    pub fn event_statuses(&self) -> Vec<EventStatusEntry> {
        self.events.iter().map(Event::report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerState;

    fn config() -> GameConfig {
        GameConfig::from_value(json!({
            "general": {"name": "Escape X", "duration": "00:01:00"},
            "cameras": [],
            "devices": [{"id": "telephone", "category": "puzzle"}, {"id": "display", "push_status": true}],
            "timers": [{"id": "timer1", "duration": "00:00:10", "event": "rule"}],
            "events": [{"id": "rule", "description": "A rule"}],
            "hints": {}
        }))
        .unwrap()
    }

    #[test]
    fn from_config_builds_fresh_state() {
        let state = GameState::from_config(config(), "front-end").unwrap();
        assert_eq!(
            state.timers.keys().collect::<Vec<_>>(),
            vec!["timer1", GENERAL_TIMER_ID]
        );
        assert_eq!(state.timers[GENERAL_TIMER_ID].initial_ms(), 60_000);
        assert_eq!(state.timers["timer1"].event(), Some("rule"));
        assert!(state.devices.values().all(|d| !d.connected));
        assert!(state.events.values().all(|e| !e.completed));
        assert_eq!(state.devices["telephone"].category, "puzzle");
    }

    #[test]
    fn console_starts_with_zero_counters() {
        let state = GameState::from_config(config(), "front-end").unwrap();
        let console = state.device("front-end").unwrap();
        assert_eq!(
            serde_json::to_value(console.report()).unwrap(),
            json!({"id": "front-end", "connection": false, "status": {"start": 0, "stop": 0}})
        );
    }

    #[test]
    fn inherit_keeps_endpoints_but_not_progress() {
        let mut old = GameState::from_config(config(), "front-end").unwrap();
        old.device_mut("telephone").unwrap().connected = true;
        old.console.connected = true;
        old.events.get_mut("rule").unwrap().completed = true;

        let mut next = GameState::from_config(config(), "front-end").unwrap();
        next.inherit_endpoints(&old);

        assert!(next.devices["telephone"].connected);
        assert!(next.console.connected);
        assert!(!next.events["rule"].completed);
    }

    #[test]
    fn snapshot_lookups() {
        let state = GameState::from_config(config(), "front-end").unwrap();
        let snapshot = Snapshot::capture(&state, Instant::now());
        assert!(snapshot.device("front-end").is_some());
        assert!(snapshot.device("display").is_some());
        assert!(snapshot.device("nope").is_none());
        assert_eq!(
            snapshot.timer(GENERAL_TIMER_ID).unwrap().state,
            TimerState::Idle
        );
        assert_eq!(
            snapshot.event_statuses(),
            vec![EventStatusEntry {
                id: "rule".into(),
                status: false
            }]
        );
    }

    #[test]
    fn missing_lookups_are_explicit() {
        let mut state = GameState::from_config(config(), "front-end").unwrap();
        assert_eq!(
            state.device("ghost").unwrap_err(),
            StoreError::DeviceNotFound("ghost".into())
        );
        assert_eq!(
            state.timer_mut("ghost").unwrap_err(),
            StoreError::TimerNotFound("ghost".into())
        );
    }
}
