//! Instruction and ingestion handlers.
//!
//! Each handler interprets one record against the store and timer engine
//! and returns the outbound messages it produced, in publish order. The
//! router does the publishing; handlers never touch the gateway.

pub mod config;
pub mod control;
pub mod ingest;
pub mod sync;

pub use ingest::handle_ingest;

use std::sync::Arc;

use serde::Serialize;

use crate::error::HandlerError;
use crate::message::{DeviceInstruction, Instruction, MessageKind, Outbound};
use crate::store::GameStore;
use crate::timer::TimerEngine;

/// Result type alias for handlers.
pub type HandlerResult = Result<Vec<Outbound>, HandlerError>;

/// Shared state every handler works against.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Game-state store
    pub store: Arc<GameStore>,
    /// Timer engine over the same store
    pub timers: Arc<TimerEngine>,
    /// This system's bus identity (origin of every outbound envelope)
    pub identity: String,
}

impl HandlerContext {
    /// Bundles the store, timer engine and identity.
    #[must_use]
    pub fn new(store: Arc<GameStore>, timers: Arc<TimerEngine>, identity: impl Into<String>) -> Self {
        Self {
            store,
            timers,
            identity: identity.into(),
        }
    }

    /// Envelope from this system to `topic`.
    pub(crate) fn message<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        kind: MessageKind,
        contents: &T,
    ) -> Result<Outbound, HandlerError> {
        Ok(Outbound::new(topic, &self.identity, kind, contents)?)
    }

    /// Single-record `instruction` envelope to `topic`.
    pub(crate) fn instruction(
        &self,
        topic: &str,
        instruction: DeviceInstruction,
    ) -> Result<Outbound, HandlerError> {
        self.message(topic, MessageKind::Instruction, &[instruction])
    }
}

/// Executes one instruction record issued by `requester`.
///
/// # Errors
///
/// Returns [`HandlerError`] when the record references an unknown id or
/// requests an impossible timer transition. Nothing is published for a
/// failed record.
pub fn handle_instruction(
    ctx: &HandlerContext,
    requester: &str,
    instruction: &Instruction,
) -> HandlerResult {
    match instruction {
        Instruction::SendSetup => sync::send_setup(ctx, requester),
        Instruction::SendStatus => sync::send_status(ctx, requester),
        Instruction::ResetAll => control::reset_all(ctx, requester),
        Instruction::TestAll => control::test_all(ctx, requester),
        Instruction::Reset { device } => control::reset_device(ctx, requester, device),
        Instruction::Test { device } | Instruction::TestDevice { device } => {
            control::test_device(ctx, requester, device)
        }
        Instruction::FinishRule { rule } => control::finish_rule(ctx, requester, rule),
        Instruction::Hint { value } => control::hint(ctx, requester, value),
        Instruction::CheckConfig { config } => config::check_config(ctx, requester, config),
        Instruction::UseConfig { config } => config::use_config(ctx, requester, config),
        Instruction::Unknown => Ok(Vec::new()),
    }
}
