//! Outbound messages.

use bytes::Bytes;
use serde::Serialize;

use super::{MessageKind, TIME_FORMAT, WireMessage};

/// An envelope addressed to a bus topic, ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Destination topic
    pub topic: String,
    /// Envelope body
    pub message: WireMessage,
}

impl Outbound {
    /// Builds an envelope from `origin`, stamped with the current local time.
    ///
    /// # Errors
    ///
    /// Returns an error if `contents` cannot be serialized.
    pub fn new<T: Serialize + ?Sized>(
        topic: impl Into<String>,
        origin: &str,
        kind: MessageKind,
        contents: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.into(),
            message: WireMessage {
                device_id: origin.to_string(),
                time_sent: chrono::Local::now().format(TIME_FORMAT).to_string(),
                kind: kind.tag().to_string(),
                contents: serde_json::to_value(contents)?,
            },
        })
    }

    /// Message kind of the envelope.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_tag(&self.message.kind)
    }

    /// Serializes the envelope for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(&self.message).map(Bytes::from)
    }
}
