//! State synchronization: `send setup` and `send status`.

use tokio::time::Instant;

use super::{HandlerContext, HandlerResult};
use crate::config::schema::GENERAL_TIMER_ID;
use crate::error::StoreError;
use crate::message::{DeviceInstruction, MessageKind, SetupContents};
use crate::store::Snapshot;

/// Instruction asking a device to report its status.
pub const STATUS_UPDATE: &str = "status update";

/// Bootstraps a newly joined console.
///
/// Publishes, all from one snapshot: the room definition, every event's
/// status, a `status update` request to each device without a push
/// channel and to the requester, the requester's own status, the `general`
/// timer, and finally every device's status.
///
/// # Errors
///
/// Returns [`StoreError::DeviceNotFound`] if the requester is unknown.
pub fn send_setup(ctx: &HandlerContext, requester: &str) -> HandlerResult {
    let snapshot = ctx.store.snapshot(Instant::now());
    let requester_status = requester_status(&snapshot, requester)?;
    let general = snapshot
        .timer(GENERAL_TIMER_ID)
        .ok_or_else(|| StoreError::TimerNotFound(GENERAL_TIMER_ID.to_string()))?;

    let setup = SetupContents {
        name: snapshot.config.general.name.clone(),
        hints: snapshot.config.hints.clone(),
        events: snapshot.config.event_descriptions(),
        cameras: snapshot.config.cameras.clone(),
    };

    let mut out = vec![
        ctx.message(requester, MessageKind::Setup, &setup)?,
        ctx.message(requester, MessageKind::EventStatus, &snapshot.event_statuses())?,
    ];
    for device in snapshot.devices.iter().filter(|d| !d.push_status) {
        out.push(ctx.instruction(&device.id, DeviceInstruction::bare(STATUS_UPDATE))?);
    }
    out.push(ctx.instruction(requester, DeviceInstruction::bare(STATUS_UPDATE))?);
    out.push(ctx.message(requester, MessageKind::Status, &requester_status)?);
    out.push(ctx.message(requester, MessageKind::Time, general)?);
    for device in &snapshot.devices {
        out.push(ctx.message(requester, MessageKind::Status, &device.report())?);
    }

    tracing::info!(requester, messages = out.len(), "setup sent");
    Ok(out)
}

/// Re-broadcasts the full live state to the requester: every event, one
/// `time` per timer (configured timers, then `general`), one `status` per
/// device, then the requester's own status.
///
/// # Errors
///
/// Returns [`StoreError::DeviceNotFound`] if the requester is unknown.
pub fn send_status(ctx: &HandlerContext, requester: &str) -> HandlerResult {
    let snapshot = ctx.store.snapshot(Instant::now());
    let requester_status = requester_status(&snapshot, requester)?;

    let mut out = vec![ctx.message(requester, MessageKind::EventStatus, &snapshot.event_statuses())?];
    for timer in &snapshot.timers {
        out.push(ctx.message(requester, MessageKind::Time, timer)?);
    }
    for device in &snapshot.devices {
        out.push(ctx.message(requester, MessageKind::Status, &device.report())?);
    }
    out.push(ctx.message(requester, MessageKind::Status, &requester_status)?);
    Ok(out)
}

fn requester_status(
    snapshot: &Snapshot,
    requester: &str,
) -> Result<crate::message::DeviceStatus, StoreError> {
    snapshot
        .device(requester)
        .map(crate::store::Device::report)
        .ok_or_else(|| StoreError::DeviceNotFound(requester.to_string()))
}
