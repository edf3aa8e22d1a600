//! Bus message model.
//!
//! Every message on the bus is a JSON envelope:
//!
//! ```json
//! {"device_id": "front-end", "time_sent": "05-12-2019 09:42:10",
//!  "type": "instruction", "contents": [{"instruction": "send setup"}]}
//! ```
//!
//! The `type` tag selects how `contents` is decoded; see [`Contents`].

pub mod contents;
pub mod instruction;
pub mod outbound;

pub use contents::{
    ConfigReply, ConnectionReport, DeviceInstruction, DeviceStatus, EventStatusEntry,
    SetupContents, TimeReport,
};
pub use instruction::Instruction;
pub use outbound::Outbound;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::validation::json_type_name;
use crate::error::MessageError;

/// `time_sent` format (`DD-MM-YYYY HH:MM:SS`, local time).
pub const TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

// ============================================================================
// Message Kinds
// ============================================================================

/// Message kind carried in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Commands for this system or for devices
    Instruction,
    /// Device status report
    Status,
    /// Timer state report
    Time,
    /// Event completion flags
    EventStatus,
    /// Configuration check/apply reply
    Config,
    /// Static room definition
    Setup,
    /// Device connectivity change
    Connection,
    /// Device acknowledgment of an instruction
    Confirmation,
}

impl MessageKind {
    /// All kinds, in wire-tag order.
    pub const ALL: [Self; 8] = [
        Self::Instruction,
        Self::Status,
        Self::Time,
        Self::EventStatus,
        Self::Config,
        Self::Setup,
        Self::Connection,
        Self::Confirmation,
    ];

    /// Wire tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Instruction => "instruction",
            Self::Status => "status",
            Self::Time => "time",
            Self::EventStatus => "event status",
            Self::Config => "config",
            Self::Setup => "setup",
            Self::Connection => "connection",
            Self::Confirmation => "confirmation",
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// Wire Form
// ============================================================================

/// Envelope exactly as it appears on the wire.
///
/// Devices send their connection updates with the body under `message`
/// instead of `contents`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Origin identifier
    pub device_id: String,
    /// Send time, `DD-MM-YYYY HH:MM:SS`
    #[serde(default)]
    pub time_sent: String,
    /// Message kind tag
    #[serde(rename = "type")]
    pub kind: String,
    /// Undecoded contents
    #[serde(default, alias = "message")]
    pub contents: Value,
}

// ============================================================================
// Decoded Envelope
// ============================================================================

/// Contents resolved by message kind.
#[derive(Debug)]
pub enum Contents {
    /// Ordered instruction records, each decoded independently.
    Instruction(Vec<Result<Instruction, MessageError>>),
    /// Device status fields to merge.
    Status(Map<String, Value>),
    /// Timer report.
    Time(TimeReport),
    /// Event completion flags.
    EventStatus(Vec<EventStatusEntry>),
    /// Connectivity change.
    Connection(ConnectionReport),
    /// Configuration reply (outbound-only kind).
    Config(Value),
    /// Room definition (outbound-only kind).
    Setup(Value),
    /// Device acknowledgment, forwarded as is.
    Confirmation(Value),
}

impl Contents {
    /// Decodes `contents` according to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidContents`] when the shape does not
    /// match the kind. Instruction records are decoded individually and
    /// their failures are kept per record.
    pub fn decode(kind: MessageKind, contents: Value) -> Result<Self, MessageError> {
        let invalid = |message: String| MessageError::InvalidContents {
            kind: kind.tag(),
            message,
        };

        match kind {
            MessageKind::Instruction => match contents {
                Value::Array(records) => Ok(Self::Instruction(
                    records.into_iter().map(Instruction::decode).collect(),
                )),
                other => Err(invalid(format!(
                    "expected array of records, found {}",
                    json_type_name(&other)
                ))),
            },
            MessageKind::Status => match contents {
                Value::Object(fields) => Ok(Self::Status(fields)),
                other => Err(invalid(format!(
                    "expected object, found {}",
                    json_type_name(&other)
                ))),
            },
            MessageKind::Time => serde_json::from_value(contents)
                .map(Self::Time)
                .map_err(|e| invalid(e.to_string())),
            MessageKind::EventStatus => serde_json::from_value(contents)
                .map(Self::EventStatus)
                .map_err(|e| invalid(e.to_string())),
            MessageKind::Connection => serde_json::from_value(contents)
                .map(Self::Connection)
                .map_err(|e| invalid(e.to_string())),
            MessageKind::Config => Ok(Self::Config(contents)),
            MessageKind::Setup => Ok(Self::Setup(contents)),
            MessageKind::Confirmation => Ok(Self::Confirmation(contents)),
        }
    }

    /// Kind these contents were decoded for.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Instruction(_) => MessageKind::Instruction,
            Self::Status(_) => MessageKind::Status,
            Self::Time(_) => MessageKind::Time,
            Self::EventStatus(_) => MessageKind::EventStatus,
            Self::Connection(_) => MessageKind::Connection,
            Self::Config(_) => MessageKind::Config,
            Self::Setup(_) => MessageKind::Setup,
            Self::Confirmation(_) => MessageKind::Confirmation,
        }
    }
}

/// A decoded inbound envelope.
#[derive(Debug)]
pub struct Envelope {
    /// Origin identifier (device id, console id)
    pub origin: String,
    /// Raw send time
    pub time_sent: String,
    /// Kind-resolved contents
    pub contents: Contents,
}

impl Envelope {
    /// Decodes a raw bus payload.
    ///
    /// Returns `Ok(None)` for envelopes of a kind this system does not know.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::MalformedEnvelope`] if the payload is not an
    /// envelope, or [`MessageError::InvalidContents`] if its contents do not
    /// fit its kind.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>, MessageError> {
        let wire: WireMessage = serde_json::from_slice(payload)
            .map_err(|e| MessageError::MalformedEnvelope(e.to_string()))?;
        Self::from_wire(wire)
    }

    /// Resolves a wire envelope's contents by kind.
    ///
    /// # Errors
    ///
    /// See [`Envelope::decode`].
    pub fn from_wire(wire: WireMessage) -> Result<Option<Self>, MessageError> {
        let Some(kind) = MessageKind::from_tag(&wire.kind) else {
            return Ok(None);
        };
        Ok(Some(Self {
            origin: wire.device_id,
            time_sent: wire.time_sent,
            contents: Contents::decode(kind, wire.contents)?,
        }))
    }

    /// Message kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.contents.kind()
    }

    /// Parsed send time, if well-formed.
    #[must_use]
    pub fn sent_at(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(&self.time_sent, TIME_FORMAT).ok()
    }
}
