//! Room control: resets, device tests, rule completion and hints.

use tracing::{debug, info};

use super::{HandlerContext, HandlerResult};
use crate::config::schema::GENERAL_TIMER_ID;
use crate::error::StoreError;
use crate::gateway::{CLIENT_COMPUTERS, HINT};
use crate::message::{DeviceInstruction, EventStatusEntry, MessageKind};

const RESET: &str = "reset";
const TEST: &str = "test";

/// Tells the whole fleet and the requester to reset, then rewinds the
/// `general` timer and reports it.
///
/// # Errors
///
/// Returns [`HandlerError`](crate::error::HandlerError) if the `general`
/// timer is missing.
pub fn reset_all(ctx: &HandlerContext, requester: &str) -> HandlerResult {
    let instruction = DeviceInstruction::issued_by(RESET, requester);
    let general = ctx.timers.reset(GENERAL_TIMER_ID)?;
    info!(requester, "room reset");
    Ok(vec![
        ctx.instruction(CLIENT_COMPUTERS, instruction.clone())?,
        ctx.instruction(requester, instruction)?,
        ctx.message(requester, MessageKind::Time, &general)?,
    ])
}

/// Tells the whole fleet to run its self-test.
///
/// # Errors
///
/// Only fails if encoding the envelope fails.
pub fn test_all(ctx: &HandlerContext, requester: &str) -> HandlerResult {
    Ok(vec![ctx.instruction(
        CLIENT_COMPUTERS,
        DeviceInstruction::issued_by(TEST, requester),
    )?])
}

/// Tells one configured device to run its self-test.
///
/// # Errors
///
/// Returns [`StoreError::DeviceNotFound`] unless `device` is in the fleet.
pub fn test_device(ctx: &HandlerContext, requester: &str, device: &str) -> HandlerResult {
    require_fleet_device(ctx, device)?;
    Ok(vec![ctx.instruction(
        device,
        DeviceInstruction::issued_by(TEST, requester),
    )?])
}

/// Tells one configured device to reset.
///
/// # Errors
///
/// Returns [`StoreError::DeviceNotFound`] unless `device` is in the fleet.
pub fn reset_device(ctx: &HandlerContext, requester: &str, device: &str) -> HandlerResult {
    require_fleet_device(ctx, device)?;
    Ok(vec![ctx.instruction(
        device,
        DeviceInstruction::issued_by(RESET, requester),
    )?])
}

/// Marks a rule completed by hand and reports it to the requester.
///
/// Completing an already completed rule changes nothing and publishes
/// nothing.
///
/// # Errors
///
/// Returns [`StoreError::EventNotFound`] for an unknown rule.
pub fn finish_rule(ctx: &HandlerContext, requester: &str, rule: &str) -> HandlerResult {
    if !ctx.store.complete_event(rule)? {
        debug!(rule, "rule already completed");
        return Ok(Vec::new());
    }
    info!(rule, requester, "rule finished");
    let entry = EventStatusEntry {
        id: rule.to_string(),
        status: true,
    };
    Ok(vec![ctx.message(requester, MessageKind::EventStatus, &[entry])?])
}

/// Relays a hint to the hint displays.
///
/// # Errors
///
/// Only fails if encoding the envelope fails.
pub fn hint(ctx: &HandlerContext, requester: &str, value: &str) -> HandlerResult {
    Ok(vec![ctx.instruction(
        HINT,
        DeviceInstruction::issued_by("hint", requester).with_value(value),
    )?])
}

fn require_fleet_device(ctx: &HandlerContext, id: &str) -> Result<(), StoreError> {
    if id == ctx.store.console_id() {
        return Err(StoreError::DeviceNotFound(id.to_string()));
    }
    ctx.store.device(id).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handlers::test_support::{context, shape};
    use crate::timer::TimerState;
    use serde_json::json;
    use tokio::time::Instant;

    #[test]
    fn reset_all_rewinds_general() {
        let ctx = context();
        ctx.timers.start(GENERAL_TIMER_ID).unwrap();
        ctx.timers.pause(GENERAL_TIMER_ID).unwrap();

        let out = reset_all(&ctx, "front-end").unwrap();
        assert_eq!(
            shape(&out),
            vec![
                ("client-computers".to_string(), "instruction".to_string()),
                ("front-end".to_string(), "instruction".to_string()),
                ("front-end".to_string(), "time".to_string()),
            ]
        );
        assert_eq!(
            out[0].message.contents,
            json!([{"instruction": "reset", "instructed_by": "front-end"}])
        );
        assert_eq!(
            out[2].message.contents,
            json!({"id": "general", "state": "stateIdle", "duration": 60_000})
        );
        let general = ctx.store.timer(GENERAL_TIMER_ID, Instant::now()).unwrap();
        assert_eq!(general.state, TimerState::Idle);
    }

    #[test]
    fn test_all_targets_fleet_topic() {
        let ctx = context();
        let out = test_all(&ctx, "front-end").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "client-computers");
        assert_eq!(
            out[0].message.contents,
            json!([{"instruction": "test", "instructed_by": "front-end"}])
        );
    }

    #[test]
    fn test_device_targets_device_topic() {
        let ctx = context();
        let out = test_device(&ctx, "front-end", "display").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "display");
        assert_eq!(
            out[0].message.contents,
            json!([{"instruction": "test", "instructed_by": "front-end"}])
        );
    }

    #[test]
    fn reset_device_targets_device_topic() {
        let ctx = context();
        let out = reset_device(&ctx, "front-end", "telephone").unwrap();
        assert_eq!(out[0].topic, "telephone");
        assert_eq!(out[0].message.contents[0]["instruction"], "reset");
    }

    #[test]
    fn device_commands_reject_unknown_and_console() {
        let ctx = context();
        for id in ["ghost", "front-end"] {
            assert!(matches!(
                test_device(&ctx, "front-end", id),
                Err(HandlerError::Lookup(StoreError::DeviceNotFound(_)))
            ));
            assert!(reset_device(&ctx, "front-end", id).is_err());
        }
    }

    #[test]
    fn finish_rule_reports_completion() {
        let ctx = context();
        let out = finish_rule(&ctx, "front-end", "other").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "front-end");
        assert_eq!(out[0].message.kind, "event status");
        assert_eq!(out[0].message.contents, json!([{"id": "other", "status": true}]));
        assert!(ctx.store.event("other").unwrap().completed);
    }

    #[test]
    fn finish_rule_leaves_attached_timers_running() {
        let ctx = context();
        ctx.timers.start("timer1").unwrap();
        let out = finish_rule(&ctx, "front-end", "rule").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message.kind, "event status");
        let timer = ctx.store.timer("timer1", Instant::now()).unwrap();
        assert_eq!(timer.state, TimerState::Running);
    }

    #[test]
    fn finish_rule_twice_is_noop() {
        let ctx = context();
        finish_rule(&ctx, "front-end", "rule").unwrap();
        let before = ctx.store.snapshot(Instant::now()).event_statuses();
        let out = finish_rule(&ctx, "front-end", "rule").unwrap();
        assert!(out.is_empty());
        assert_eq!(ctx.store.snapshot(Instant::now()).event_statuses(), before);
    }

    #[test]
    fn finish_unknown_rule_fails() {
        let ctx = context();
        assert!(matches!(
            finish_rule(&ctx, "front-end", "nope"),
            Err(HandlerError::Lookup(StoreError::EventNotFound(_)))
        ));
    }

    #[test]
    fn hint_goes_to_hint_topic() {
        let ctx = context();
        let out = hint(&ctx, "front-end", "Look under the desk").unwrap();
        assert_eq!(out[0].topic, "hint");
        assert_eq!(
            out[0].message.contents,
            json!([{"instruction": "hint", "value": "Look under the desk", "instructed_by": "front-end"}])
        );
    }
}
