//! Bus gateway abstraction.
//!
//! The core never talks to a broker directly. It publishes through the
//! [`BusGateway`] trait, and inbound payloads are fed to the router by
//! whatever owns the subscription (see [`stdio::FrameReader`]).

pub mod memory;
pub mod stdio;

pub use memory::{MemoryGateway, Published};
pub use stdio::{DEFAULT_MAX_FRAME_SIZE, FrameReader, InboundFrame, StdioGateway};

use std::fmt;

use bytes::Bytes;
use tracing::{trace, warn};

use crate::error::GatewayError;
use crate::message::Outbound;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Delivery level for every publish: acknowledged and retained for late
/// subscribers.
pub const DELIVERY_LEVEL: u8 = 3;

/// Operator console topic.
pub const FRONT_END: &str = "front-end";

/// Fleet-wide topic reaching every device-hosting computer.
pub const CLIENT_COMPUTERS: &str = "client-computers";

/// Hint display topic.
pub const HINT: &str = "hint";

/// Default identity of this system on the bus.
pub const BACK_END: &str = "back-end";

/// Gateway kind identifier for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayType {
    /// NDJSON frames over stdin/stdout.
    Stdio,
    /// In-process recorder.
    Memory,
}

impl fmt::Display for GatewayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Publish capability of the bus.
///
/// Implementations use interior mutability so one gateway can be shared
/// by the router and the timer ticker.
#[async_trait::async_trait]
pub trait BusGateway: Send + Sync {
    /// Publishes `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Bytes, delivery_level: u8) -> Result<()>;

    /// Gateway kind.
    fn gateway_type(&self) -> GatewayType;
}

/// Publishes `messages` in order at [`DELIVERY_LEVEL`].
///
/// Failures are logged and counted, never propagated; returns how many
/// messages were published.
pub async fn publish_all(gateway: &dyn BusGateway, messages: Vec<Outbound>) -> usize {
    let mut published = 0;
    for message in messages {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "failed to encode message");
                crate::observability::metrics::record_publish_error(gateway.gateway_type());
                continue;
            }
        };
        match gateway.publish(&message.topic, payload, DELIVERY_LEVEL).await {
            Ok(()) => {
                trace!(topic = %message.topic, kind = %message.message.kind, "published");
                crate::observability::metrics::record_published(&message.message.kind);
                published += 1;
            }
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    gateway = %gateway.gateway_type(),
                    error = %e,
                    "publish failed"
                );
                crate::observability::metrics::record_publish_error(gateway.gateway_type());
            }
        }
    }
    published
}
