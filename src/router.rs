//! Message router.
//!
//! The [`Router`] is the single entry point for inbound bus traffic. It
//! decodes payloads, dispatches instruction records one at a time and
//! publishes each record's output before the next record runs.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::gateway::{BusGateway, publish_all};
use crate::handlers::{self, HandlerContext};
use crate::message::{Contents, Envelope};
use crate::observability::metrics;

/// What routing one envelope did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    /// Records handled (instruction records, or 1 for other kinds)
    pub records: usize,
    /// Records that failed
    pub failed: usize,
    /// Messages published
    pub published: usize,
}

/// Routes inbound envelopes to handlers and publishes their output.
pub struct Router {
    ctx: HandlerContext,
    gateway: Arc<dyn BusGateway>,
    dispatch: Mutex<()>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("identity", &self.ctx.identity)
            .field("gateway", &self.gateway.gateway_type())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router publishing through `gateway`.
    #[must_use]
    pub fn new(ctx: HandlerContext, gateway: Arc<dyn BusGateway>) -> Self {
        Self {
            ctx,
            gateway,
            dispatch: Mutex::new(()),
        }
    }

    /// Handler context shared with the router.
    #[must_use]
    pub const fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Decodes and routes a raw bus payload.
    ///
    /// Undecodable payloads and unknown kinds are logged and dropped.
    pub async fn route_payload(&self, payload: &[u8]) -> RouteSummary {
        match Envelope::decode(payload) {
            Ok(Some(envelope)) => self.route(envelope).await,
            Ok(None) => {
                debug!("ignoring envelope of unknown kind");
                metrics::record_message("__unknown__");
                RouteSummary::default()
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable payload");
                metrics::record_decode_error();
                RouteSummary::default()
            }
        }
    }

    /// Routes one decoded envelope.
    ///
    /// Envelopes are processed one at a time. A failing record is logged
    /// and skipped; later records still run.
    pub async fn route(&self, envelope: Envelope) -> RouteSummary {
        let _dispatch = self.dispatch.lock().await;
        let started = Instant::now();
        let kind = envelope.kind();
        metrics::record_message(kind.tag());

        let mut summary = RouteSummary::default();
        match &envelope.contents {
            Contents::Instruction(records) => {
                for record in records {
                    summary.records += 1;
                    let instruction = match record {
                        Ok(instruction) => instruction,
                        Err(e) => {
                            warn!(origin = %envelope.origin, error = %e, "skipping undecodable instruction");
                            metrics::record_instruction("__unknown__", "error");
                            summary.failed += 1;
                            continue;
                        }
                    };
                    let tag = instruction.tag();
                    match handlers::handle_instruction(&self.ctx, &envelope.origin, instruction) {
                        Ok(messages) => {
                            debug!(origin = %envelope.origin, instruction = tag, messages = messages.len(), "instruction handled");
                            metrics::record_instruction(tag, "ok");
                            summary.published += publish_all(self.gateway.as_ref(), messages).await;
                        }
                        Err(e) => {
                            warn!(origin = %envelope.origin, instruction = tag, error = %e, "instruction failed");
                            metrics::record_instruction(tag, "error");
                            summary.failed += 1;
                        }
                    }
                }
            }
            _ => {
                summary.records = 1;
                match handlers::handle_ingest(&self.ctx, &envelope) {
                    Ok(messages) => {
                        summary.published += publish_all(self.gateway.as_ref(), messages).await;
                    }
                    Err(e) => {
                        warn!(origin = %envelope.origin, kind = %kind, error = %e, "report rejected");
                        summary.failed += 1;
                    }
                }
            }
        }

        metrics::record_dispatch_duration(kind.tag(), started.elapsed());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::handlers::test_support::context;
    use serde_json::{Value, json};

    fn router() -> (Router, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::new());
        (Router::new(context(), Arc::clone(&gateway) as Arc<dyn BusGateway>), gateway)
    }

    fn instruction(records: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "device_id": "front-end",
            "time_sent": "05-12-2019 09:42:10",
            "type": "instruction",
            "contents": records
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn failing_record_does_not_block_later_records() {
        let (router, gateway) = router();
        let summary = router
            .route_payload(&instruction(json!([
                {"instruction": "test device", "device": "ghost"},
                {"instruction": "test device", "device": "display"}
            ])))
            .await;
        assert_eq!(summary, RouteSummary { records: 2, failed: 1, published: 1 });
        assert_eq!(gateway.published()[0].topic, "display");
    }

    #[tokio::test]
    async fn malformed_record_is_skipped() {
        let (router, gateway) = router();
        let summary = router
            .route_payload(&instruction(json!([
                {"instruction": "finish rule"},
                {"instruction": "test all"}
            ])))
            .await;
        assert_eq!(summary.failed, 1);
        assert_eq!(gateway.published().len(), 1);
    }

    #[tokio::test]
    async fn unknown_instruction_publishes_nothing() {
        let (router, gateway) = router();
        let summary = router
            .route_payload(&instruction(json!([{"instruction": "name"}])))
            .await;
        assert_eq!(summary, RouteSummary { records: 1, failed: 0, published: 0 });
        assert!(gateway.published().is_empty());
    }

    #[tokio::test]
    async fn garbage_and_unknown_kinds_are_dropped() {
        let (router, gateway) = router();
        assert_eq!(router.route_payload(b"not json").await, RouteSummary::default());
        let gossip = serde_json::to_vec(&json!({
            "device_id": "display", "time_sent": "", "type": "gossip", "contents": {}
        }))
        .unwrap();
        assert_eq!(router.route_payload(&gossip).await, RouteSummary::default());
        assert!(gateway.published().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_keeps_state_change() {
        let gateway = Arc::new(MemoryGateway::failing());
        let router = Router::new(context(), Arc::clone(&gateway) as Arc<dyn BusGateway>);
        let summary = router
            .route_payload(&instruction(json!([{"instruction": "finish rule", "rule": "rule"}])))
            .await;
        assert_eq!(summary.published, 0);
        assert_eq!(summary.failed, 0);
        assert!(router.context().store.event("rule").unwrap().completed);
    }
}
