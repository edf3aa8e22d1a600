//! Ingestion of device and console reports.
//!
//! Everything except `instruction` lands here. Reports update the store and
//! are forwarded to the console so it always shows the live room.

use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{HandlerContext, HandlerResult};
use crate::config::schema::GENERAL_TIMER_ID;
use crate::error::StoreError;
use crate::message::{
    ConnectionReport, Contents, Envelope, EventStatusEntry, MessageKind, Outbound, TimeReport,
};

/// Console status counter that starts (or resumes) the game.
pub const START_COUNTER: &str = "start";
/// Console status counter that pauses the game.
pub const STOP_COUNTER: &str = "stop";

/// Applies one non-instruction envelope.
///
/// # Errors
///
/// Returns [`HandlerError`](crate::error::HandlerError) when the origin or
/// a referenced timer is unknown, or when a console counter asks for an
/// impossible timer transition.
pub fn handle_ingest(ctx: &HandlerContext, envelope: &Envelope) -> HandlerResult {
    let origin = envelope.origin.as_str();
    match &envelope.contents {
        Contents::Status(fields) if origin == ctx.store.console_id() => {
            console_status(ctx, origin, fields.clone())
        }
        Contents::Status(fields) => device_status(ctx, origin, fields.clone()),
        Contents::Connection(report) => connection(ctx, origin, *report),
        Contents::Time(report) => time(ctx, report),
        Contents::EventStatus(entries) => event_status(ctx, origin, entries),
        Contents::Confirmation(body) => confirmation(ctx, origin, body),
        Contents::Config(_) | Contents::Setup(_) => {
            debug!(origin, kind = %envelope.kind(), "ignoring outbound-only kind");
            Ok(Vec::new())
        }
        Contents::Instruction(_) => Ok(Vec::new()),
    }
}

fn device_status(ctx: &HandlerContext, origin: &str, fields: Map<String, Value>) -> HandlerResult {
    let merged = ctx.store.merge_device_status(origin, fields)?;
    Ok(vec![ctx.message(
        ctx.store.console_id(),
        MessageKind::Status,
        &merged.device.report(),
    )?])
}

/// The console drives the `general` timer by bumping its counters.
fn console_status(ctx: &HandlerContext, origin: &str, fields: Map<String, Value>) -> HandlerResult {
    let merged = ctx.store.merge_device_status(origin, fields)?;
    let now = &merged.device.status;
    let before = &merged.previous;

    let report = if counter(now, START_COUNTER) > counter(before, START_COUNTER) {
        Some(ctx.timers.start_or_resume(GENERAL_TIMER_ID)?)
    } else if counter(now, STOP_COUNTER) > counter(before, STOP_COUNTER) {
        Some(ctx.timers.pause(GENERAL_TIMER_ID)?)
    } else {
        None
    };

    match report {
        Some(general) => {
            debug!(state = %general.state, remaining_ms = general.duration, "console moved general timer");
            Ok(vec![ctx.message(origin, MessageKind::Time, &general)?])
        }
        None => Ok(Vec::new()),
    }
}

fn counter(status: &Map<String, Value>, name: &str) -> f64 {
    status.get(name).and_then(Value::as_f64).unwrap_or(0.0)
}

fn connection(ctx: &HandlerContext, origin: &str, report: ConnectionReport) -> HandlerResult {
    let device = ctx.store.set_device_connection(origin, report.connection)?;
    debug!(device = origin, connected = report.connection, "connection changed");
    Ok(vec![ctx.message(
        ctx.store.console_id(),
        MessageKind::Status,
        &device.report(),
    )?])
}

fn time(ctx: &HandlerContext, report: &TimeReport) -> HandlerResult {
    ctx.store
        .set_timer(&report.id, report.state, report.duration, Instant::now())?;
    Ok(Vec::new())
}

fn event_status(ctx: &HandlerContext, origin: &str, entries: &[EventStatusEntry]) -> HandlerResult {
    let mut accepted = Vec::with_capacity(entries.len());
    for entry in entries {
        match ctx.store.set_event_status(&entry.id, entry.status) {
            Ok(_) => accepted.push(entry.clone()),
            Err(StoreError::EventNotFound(id)) => {
                warn!(origin, event = %id, "status for unknown event skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    if accepted.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![ctx.message(
        ctx.store.console_id(),
        MessageKind::EventStatus,
        &accepted,
    )?])
}

/// Confirmations keep the confirming device as origin; the console reads
/// who confirmed from the envelope.
fn confirmation(ctx: &HandlerContext, origin: &str, body: &Value) -> HandlerResult {
    Ok(vec![Outbound::new(
        ctx.store.console_id(),
        origin,
        MessageKind::Confirmation,
        body,
    )?])
}
