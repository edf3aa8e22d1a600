//! `run` command.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::ConfigLoader;
use crate::error::RoomKeeperError;
use crate::gateway::{BusGateway, FrameReader, StdioGateway};
use crate::server::{Server, ServerOptions};
use crate::store::GameStore;

/// Loads the room and serves the bus over stdio until stdin closes or
/// `cancel` fires.
///
/// # Errors
///
/// Returns a config error if the room cannot be loaded, or a gateway error
/// if reading input fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), RoomKeeperError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    tracing::info!(config = %args.config.display(), "loading configuration");
    let loader = ConfigLoader::new(&args.config);
    let config = loader.load()?;
    tracing::info!(
        name = %config.general.name,
        devices = config.devices.len(),
        timers = config.timers.len(),
        events = config.events.len(),
        "room loaded"
    );

    let mut store = GameStore::new(config)?;
    if args.no_persist {
        tracing::info!("persistence disabled");
    } else {
        store = store.with_persistence(loader);
    }

    let gateway: Arc<dyn BusGateway> = Arc::new(StdioGateway::stdout());
    let options = ServerOptions {
        identity: args.identity.clone(),
        tick: args.tick,
    };
    let server = Server::new(Arc::new(store), gateway, options, cancel);
    server
        .run(FrameReader::new(tokio::io::stdin(), args.max_frame_size))
        .await
}
