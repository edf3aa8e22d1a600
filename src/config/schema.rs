//! Configuration schema types.
//!
//! This module defines the persisted game configuration document: the
//! static puzzle definition (hints, events, cameras) plus the device fleet
//! and timer definitions. The document is JSON; see
//! [`validation`](super::validation) for the structural checks applied to
//! untrusted input before it is deserialized into these types.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Id of the timer that always exists and tracks the whole experience.
pub const GENERAL_TIMER_ID: &str = "general";

/// Category assigned to devices that do not declare one.
pub const DEFAULT_DEVICE_CATEGORY: &str = "device";

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration document for one escape room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GameConfig {
    /// Room-wide settings, including the `general` timer duration
    pub general: GeneralSettings,

    /// Camera feeds shown on the operator console, in display order
    pub cameras: Vec<Camera>,

    /// Device fleet
    pub devices: Vec<DeviceConfig>,

    /// Additional countdown timers (the `general` timer is implicit)
    pub timers: Vec<TimerConfig>,

    /// Puzzle completion events (rules)
    pub events: Vec<EventConfig>,

    /// Hint groups: group name to ordered hint texts
    pub hints: IndexMap<String, Vec<String>>,
}

impl GameConfig {
    /// Deserializes a configuration from an already-validated JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the document does not match
    /// the schema.
    pub fn from_value(document: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(document).map_err(|e| ConfigError::InvalidValue {
            field: "<document>".to_string(),
            value: e.to_string(),
            expected: "a game configuration document".to_string(),
        })
    }

    /// Returns the event description map (`id -> description`) in
    /// configuration order.
    #[must_use]
    pub fn event_descriptions(&self) -> IndexMap<String, String> {
        self.events
            .iter()
            .map(|e| (e.id.clone(), e.description.clone()))
            .collect()
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Room-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Display name of the room
    pub name: String,

    /// Initial duration of the `general` timer as `HH:MM:SS`
    pub duration: String,

    /// Bus broker host (informational; the transport layer owns the connection)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Bus broker port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl GeneralSettings {
    /// Returns the `general` timer duration in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `duration` is not `HH:MM:SS`.
    pub fn duration_ms(&self) -> Result<u64, ConfigError> {
        parse_clock_duration(&self.duration).ok_or_else(|| ConfigError::InvalidValue {
            field: "general.duration".to_string(),
            value: self.duration.clone(),
            expected: "HH:MM:SS".to_string(),
        })
    }
}

/// A camera feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    /// Display name
    pub name: String,
    /// Stream URL
    pub link: String,
}

/// A device in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device id; also the device's bus topic
    pub id: String,

    /// Free-form category (puzzle, display, timer, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the device pushes its status on its own. Devices without a
    /// push channel are asked for a `status update` when a console joins.
    #[serde(default, deserialize_with = "null_as_false")]
    pub push_status: bool,
}

impl DeviceConfig {
    /// Returns the declared category or [`DEFAULT_DEVICE_CATEGORY`].
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_DEVICE_CATEGORY)
    }
}

/// Absent and `null` both mean "does not push".
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// A countdown timer definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Unique timer id (must not be `general`)
    pub id: String,

    /// Initial duration as `HH:MM:SS`
    pub duration: String,

    /// Event this timer belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl TimerConfig {
    /// Returns the initial duration in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `duration` is not `HH:MM:SS`.
    pub fn duration_ms(&self) -> Result<u64, ConfigError> {
        parse_clock_duration(&self.duration).ok_or_else(|| ConfigError::InvalidValue {
            field: format!("timers.{}.duration", self.id),
            value: self.duration.clone(),
            expected: "HH:MM:SS".to_string(),
        })
    }
}

/// A puzzle completion event (rule).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Unique event id
    pub id: String,
    /// Description shown in the operator's puzzle table
    pub description: String,
}

// ============================================================================
// Durations
// ============================================================================

/// Parses an `HH:MM:SS` clock duration into milliseconds.
///
/// Hours may have any number of digits; minutes and seconds must be below 60.
/// Returns `None` for anything else.
#[must_use]
pub fn parse_clock_duration(text: &str) -> Option<u64> {
    let mut parts = text.split(':');
    let hours = parse_clock_part(parts.next()?)?;
    let minutes = parse_clock_part(parts.next()?)?;
    let seconds = parse_clock_part(parts.next()?)?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)
}

fn parse_clock_part(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}
