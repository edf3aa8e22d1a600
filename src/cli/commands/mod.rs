//! CLI command dispatch.

pub mod run;
pub mod validate;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::RoomKeeperError;

/// Dispatches a parsed CLI invocation. `cancel` fires on the first
/// shutdown signal.
///
/// # Errors
///
/// Returns an error if the dispatched command fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), RoomKeeperError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Validate(args) => validate::run(&args),
    }
}
