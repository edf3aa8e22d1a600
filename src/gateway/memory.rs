//! In-process gateway that records every publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

use super::{BusGateway, GatewayType};
use crate::error::GatewayError;
use crate::message::WireMessage;

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Topic
    pub topic: String,
    /// Raw payload
    pub payload: Bytes,
    /// Delivery level requested
    pub delivery_level: u8,
}

impl Published {
    /// Decodes the payload as a wire envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not an envelope.
    pub fn message(&self) -> Result<WireMessage, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Gateway that keeps publishes in memory.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    published: Mutex<Vec<Published>>,
    failing: AtomicBool,
}

impl MemoryGateway {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway whose publishes all fail.
    #[must_use]
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.set_failing(true);
        gateway
    }

    /// Toggles failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything published so far.
    #[must_use]
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains and returns everything published so far.
    pub fn take(&self) -> Vec<Published> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait::async_trait]
impl BusGateway for MemoryGateway {
    async fn publish(&self, topic: &str, payload: Bytes, delivery_level: u8) -> super::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Closed);
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Published {
                topic: topic.to_string(),
                payload,
                delivery_level,
            });
        Ok(())
    }

    fn gateway_type(&self) -> GatewayType {
        GatewayType::Memory
    }
}
