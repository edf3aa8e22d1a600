//! Server runtime.
//!
//! The [`Server`] wires the store, timer engine, router and gateway
//! together and pumps inbound frames into the router until the input ends
//! or the cancellation token fires.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RoomKeeperError;
use crate::gateway::{BusGateway, FrameReader};
use crate::handlers::HandlerContext;
use crate::observability::metrics;
use crate::router::Router;
use crate::store::GameStore;
use crate::timer::TimerEngine;

/// Options for constructing a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Identity used as origin of every outbound envelope
    pub identity: String,
    /// Timer tick interval
    pub tick: std::time::Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            identity: crate::gateway::BACK_END.to_string(),
            tick: crate::timer::DEFAULT_TICK,
        }
    }
}

/// A running room server.
pub struct Server {
    router: Router,
    timers: Arc<TimerEngine>,
    gateway: Arc<dyn BusGateway>,
    identity: String,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("identity", &self.identity)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Builds a server over `store`, publishing through `gateway`.
    #[must_use]
    pub fn new(
        store: Arc<GameStore>,
        gateway: Arc<dyn BusGateway>,
        options: ServerOptions,
        cancel: CancellationToken,
    ) -> Self {
        let timers = Arc::new(
            TimerEngine::new(Arc::clone(&store))
                .with_tick(options.tick)
                .with_cancel(cancel.child_token()),
        );
        let ctx = HandlerContext::new(store, Arc::clone(&timers), options.identity.clone());
        Self {
            router: Router::new(ctx, Arc::clone(&gateway)),
            timers,
            gateway,
            identity: options.identity,
            cancel,
        }
    }

    /// The router inbound payloads go through.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Reads frames from `reader` and routes them until end of input or
    /// cancellation. The timer ticker runs for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns [`RoomKeeperError::Gateway`] if reading input fails.
    pub async fn run<R: AsyncRead + Unpin>(
        &self,
        mut frames: FrameReader<R>,
    ) -> Result<(), RoomKeeperError> {
        let started = Instant::now();
        let ticker = self
            .timers
            .start_ticker(Arc::clone(&self.gateway), self.identity.clone());
        info!(identity = %self.identity, gateway = %self.gateway.gateway_type(), "server started");

        let result = loop {
            let frame = tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("server cancelled");
                    break Ok(());
                }
                frame = frames.next_frame() => frame,
            };

            match frame {
                Ok(Some(frame)) => {
                    if let Some(topic) = &frame.topic {
                        debug!(topic = %topic, "frame");
                    }
                    let summary = self.router.route_payload(&frame.payload).await;
                    if summary.failed > 0 {
                        debug!(failed = summary.failed, records = summary.records, "envelope had failures");
                    }
                    metrics::set_uptime(started.elapsed());
                }
                Ok(None) => {
                    debug!("input closed, shutting down");
                    break Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "input failed");
                    break Err(RoomKeeperError::from(e));
                }
            }
        };

        self.timers.shutdown();
        if let Err(e) = ticker.await {
            warn!(error = %e, "timer ticker panicked");
        }
        info!(uptime_ms = started.elapsed().as_millis(), "server stopped");
        result
    }
}
