//! Inbound instruction records.
//!
//! Records are decoded one at a time so a malformed record fails alone and
//! its siblings in the same envelope still run.

use serde::Deserialize;
use serde_json::Value;

use crate::error::MessageError;

/// A decoded instruction record.
///
/// Unrecognized tags decode to [`Instruction::Unknown`] and are no-ops.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "instruction")]
pub enum Instruction {
    /// Bootstrap snapshot for a newly joined console.
    #[serde(rename = "send setup")]
    SendSetup,

    /// Re-broadcast the full live state to the requester.
    #[serde(rename = "send status")]
    SendStatus,

    /// Restart the whole experience.
    #[serde(rename = "reset all")]
    ResetAll,

    /// Put the whole fleet into test mode.
    #[serde(rename = "test all")]
    TestAll,

    /// Reset one device.
    #[serde(rename = "reset")]
    Reset {
        /// Target device id
        device: String,
    },

    /// Test one device.
    #[serde(rename = "test")]
    Test {
        /// Target device id
        device: String,
    },

    /// Test one device (console spelling).
    #[serde(rename = "test device")]
    TestDevice {
        /// Target device id
        device: String,
    },

    /// Mark an event (rule) completed.
    #[serde(rename = "finish rule")]
    FinishRule {
        /// Event id
        rule: String,
    },

    /// Relay an operator hint to the hint displays.
    #[serde(rename = "hint")]
    Hint {
        /// Hint text
        value: String,
    },

    /// Validate a configuration document without applying it.
    #[serde(rename = "check config")]
    CheckConfig {
        /// Untrusted document
        config: Value,
    },

    /// Validate, persist and apply a configuration document.
    #[serde(rename = "use config")]
    UseConfig {
        /// Untrusted document
        config: Value,
    },

    /// Any tag this system does not act on.
    #[serde(other)]
    Unknown,
}

impl Instruction {
    /// Decodes one record.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidInstruction`] when the record has no
    /// tag, or a recognized tag with missing or mistyped fields.
    pub fn decode(record: Value) -> Result<Self, MessageError> {
        serde_json::from_value(record).map_err(|e| MessageError::InvalidInstruction(e.to_string()))
    }

    /// Wire tag, or `"unknown"` for unrecognized records.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::SendSetup => "send setup",
            Self::SendStatus => "send status",
            Self::ResetAll => "reset all",
            Self::TestAll => "test all",
            Self::Reset { .. } => "reset",
            Self::Test { .. } => "test",
            Self::TestDevice { .. } => "test device",
            Self::FinishRule { .. } => "finish rule",
            Self::Hint { .. } => "hint",
            Self::CheckConfig { .. } => "check config",
            Self::UseConfig { .. } => "use config",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_known_tags() {
        assert_eq!(
            Instruction::decode(json!({"instruction": "send setup"})).unwrap(),
            Instruction::SendSetup
        );
        assert_eq!(
            Instruction::decode(json!({"instruction": "test device", "device": "display"}))
                .unwrap(),
            Instruction::TestDevice {
                device: "display".into()
            }
        );
        assert_eq!(
            Instruction::decode(json!({"instruction": "finish rule", "rule": "rule"})).unwrap(),
            Instruction::FinishRule {
                rule: "rule".into()
            }
        );
    }

    #[test]
    fn decode_unknown_tag_is_noop_variant() {
        let decoded = Instruction::decode(json!({"instruction": "name"})).unwrap();
        assert_eq!(decoded, Instruction::Unknown);
        assert_eq!(decoded.tag(), "unknown");
    }

    #[test]
    fn decode_missing_field_fails() {
        let err = Instruction::decode(json!({"instruction": "finish rule"})).unwrap_err();
        assert!(err.to_string().contains("rule"));
    }

    #[test]
    fn decode_mistyped_field_fails() {
        assert!(Instruction::decode(json!({"instruction": "hint", "value": 3})).is_err());
    }

    #[test]
    fn decode_without_tag_fails() {
        assert!(Instruction::decode(json!({"device": "display"})).is_err());
        assert!(Instruction::decode(json!("send setup")).is_err());
    }

    #[test]
    fn config_payload_is_kept_verbatim() {
        let doc = json!({"general": {"name": "X"}});
        let decoded =
            Instruction::decode(json!({"instruction": "check config", "config": doc.clone()}))
                .unwrap();
        assert_eq!(decoded, Instruction::CheckConfig { config: doc });
    }
}
