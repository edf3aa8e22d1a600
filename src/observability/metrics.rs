//! Prometheus metrics.
//!
//! Label values that come off the bus (message kinds, instruction tags)
//! are checked against the known sets; anything else is bucketed as
//! `"__unknown__"` so a misbehaving device cannot grow label cardinality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::RoomKeeperError;
use crate::gateway::GatewayType;
use crate::message::MessageKind;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const UNKNOWN_LABEL: &str = "__unknown__";

/// Instruction tags acted on by the handler.
const KNOWN_INSTRUCTIONS: [&str; 11] = [
    "send setup",
    "send status",
    "reset all",
    "test all",
    "reset",
    "test",
    "test device",
    "finish rule",
    "hint",
    "check config",
    "use config",
];

/// Sanitizes a message kind tag for use as a label.
#[must_use]
pub fn sanitize_kind_label(kind: &str) -> &str {
    if MessageKind::from_tag(kind).is_some() {
        kind
    } else {
        UNKNOWN_LABEL
    }
}

/// Sanitizes an instruction tag for use as a label.
#[must_use]
pub fn sanitize_instruction_label(tag: &str) -> &str {
    if KNOWN_INSTRUCTIONS.contains(&tag) {
        tag
    } else {
        UNKNOWN_LABEL
    }
}

/// Installs the global recorder, with an HTTP listener on
/// `127.0.0.1:<port>` when `port` is given.
///
/// # Errors
///
/// Returns `RoomKeeperError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), RoomKeeperError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| RoomKeeperError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "roomkeeper_messages_total",
        "Inbound envelopes routed, by kind"
    );
    describe_counter!(
        "roomkeeper_instructions_total",
        "Instruction records handled, by tag and outcome"
    );
    describe_counter!(
        "roomkeeper_decode_errors_total",
        "Inbound payloads that could not be decoded"
    );
    describe_counter!(
        "roomkeeper_published_total",
        "Outbound envelopes published, by kind"
    );
    describe_counter!(
        "roomkeeper_publish_errors_total",
        "Publishes that failed, by gateway"
    );
    describe_counter!("roomkeeper_timers_expired_total", "Timers that ran out");
    describe_counter!(
        "roomkeeper_config_swaps_total",
        "Configuration swap attempts, by outcome"
    );
    describe_histogram!(
        "roomkeeper_dispatch_duration_ms",
        "Envelope dispatch duration in milliseconds"
    );
    describe_gauge!("roomkeeper_uptime_seconds", "Process uptime in seconds");
}

/// Records a routed inbound envelope.
pub fn record_message(kind: &str) {
    counter!("roomkeeper_messages_total", "kind" => sanitize_kind_label(kind).to_owned())
        .increment(1);
}

/// Records one handled instruction record.
pub fn record_instruction(tag: &str, outcome: &'static str) {
    counter!(
        "roomkeeper_instructions_total",
        "instruction" => sanitize_instruction_label(tag).to_owned(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Records a payload that failed to decode.
pub fn record_decode_error() {
    counter!("roomkeeper_decode_errors_total").increment(1);
}

/// Records a successful publish.
pub fn record_published(kind: &str) {
    counter!("roomkeeper_published_total", "kind" => sanitize_kind_label(kind).to_owned())
        .increment(1);
}

/// Records a failed publish.
pub fn record_publish_error(gateway: GatewayType) {
    counter!("roomkeeper_publish_errors_total", "gateway" => gateway.to_string()).increment(1);
}

/// Records a timer expiry.
pub fn record_timer_expired() {
    counter!("roomkeeper_timers_expired_total").increment(1);
}

/// Records a configuration swap attempt.
pub fn record_config_swap(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    counter!("roomkeeper_config_swaps_total", "outcome" => outcome).increment(1);
}

/// Records how long one envelope took to dispatch.
pub fn record_dispatch_duration(kind: &str, duration: Duration) {
    histogram!(
        "roomkeeper_dispatch_duration_ms",
        "kind" => sanitize_kind_label(kind).to_owned()
    )
    .record(duration.as_secs_f64() * 1000.0);
}

/// Sets the uptime gauge.
pub fn set_uptime(duration: Duration) {
    gauge!("roomkeeper_uptime_seconds").set(duration.as_secs_f64());
}
