//! Typed message contents.
//!
//! Each record type here is the `contents` payload of one message kind, or
//! an element of it for the sequence kinds (`instruction`, `event status`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::schema::Camera;
use crate::timer::TimerState;

/// `time` contents: one timer's state and remaining duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeReport {
    /// Timer id
    pub id: String,
    /// Lifecycle state
    pub state: TimerState,
    /// Remaining milliseconds
    pub duration: u64,
}

/// One element of `event status` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStatusEntry {
    /// Event (rule) id
    pub id: String,
    /// Completion flag
    pub status: bool,
}

/// Outbound `status` contents describing one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Device id
    pub id: String,
    /// Whether the device is currently connected
    pub connection: bool,
    /// Device-owned status fields
    pub status: Map<String, Value>,
}

/// Inbound `connection` contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    /// New connected flag
    pub connection: bool,
}

/// Outbound `setup` contents: the static room definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupContents {
    /// Room name
    pub name: String,
    /// Hint groups in configuration order
    pub hints: IndexMap<String, Vec<String>>,
    /// Event descriptions keyed by event id
    pub events: IndexMap<String, String>,
    /// Camera feeds
    pub cameras: Vec<Camera>,
}

/// Outbound `config` contents.
///
/// `check config` always carries the (possibly empty) error list; an
/// accepted `use config` replies with an empty object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigReply {
    /// Validation or persistence errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ConfigReply {
    /// Reply carrying `errors` (an empty list means valid).
    #[must_use]
    pub const fn errors(errors: Vec<String>) -> Self {
        Self {
            errors: Some(errors),
        }
    }

    /// Empty acknowledgment of an applied configuration.
    #[must_use]
    pub const fn accepted() -> Self {
        Self { errors: None }
    }
}

/// One outbound instruction record addressed to devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInstruction {
    /// Instruction tag understood by devices
    pub instruction: String,
    /// Instruction argument (hint text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Who issued the instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructed_by: Option<String>,
}

impl DeviceInstruction {
    /// Instruction issued on behalf of `requester`.
    #[must_use]
    pub fn issued_by(instruction: &str, requester: &str) -> Self {
        Self {
            instruction: instruction.to_string(),
            value: None,
            instructed_by: Some(requester.to_string()),
        }
    }

    /// Instruction with no issuer (sent on the system's own behalf).
    #[must_use]
    pub fn bare(instruction: &str) -> Self {
        Self {
            instruction: instruction.to_string(),
            value: None,
            instructed_by: None,
        }
    }

    /// Attaches a value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}
