//! `validate` command.

use crate::cli::args::ValidateArgs;
use crate::config::{ConfigLoader, validate_document};
use crate::error::{ConfigError, RoomKeeperError};

/// Validates each file and prints every error found.
///
/// # Errors
///
/// Returns the first file's read error, or a validation error once all
/// files have been checked and at least one was invalid.
pub fn run(args: &ValidateArgs) -> Result<(), RoomKeeperError> {
    let mut invalid = Vec::new();

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let document = ConfigLoader::new(path).read_document()?;
        let errors = validate_document(&document);
        if errors.is_empty() {
            println!("{}: ok", path.display());
            continue;
        }
        for error in &errors {
            println!("{}: {error}", path.display());
        }
        invalid.push((path.display().to_string(), errors));
    }

    match invalid.into_iter().next() {
        None => Ok(()),
        Some((path, errors)) => Err(ConfigError::ValidationError { path, errors }.into()),
    }
}
