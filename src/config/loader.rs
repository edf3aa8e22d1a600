//! Configuration loader and persistence.
//!
//! Loading pipeline:
//! 1. Size check against [`ConfigLimits`]
//! 2. Read (UTF-8 BOM stripped)
//! 3. JSON parsing
//! 4. Validation ([`validate_document`])
//! 5. Deserialization to [`GameConfig`]
//!
//! Persistence writes the document to a sibling temporary file, syncs it and
//! renames it over the target so readers never observe a truncated file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::schema::GameConfig;
use crate::config::validation::validate_document;
use crate::error::ConfigError;

/// Limits applied when reading configuration documents.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("ROOMKEEPER_MAX_CONFIG_SIZE", 10 * 1024 * 1024),
        }
    }
}

/// Configuration loader bound to one document on disk.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader for the document at `path` with default limits.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limits: ConfigLimits::default(),
        }
    }

    /// Replaces the loader's limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ConfigLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the document without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, too large, or not JSON.
    pub fn read_document(&self) -> Result<serde_json::Value, ConfigError> {
        let metadata = fs::metadata(&self.path).map_err(|_| ConfigError::MissingFile {
            path: self.path.clone(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw = fs::read_to_string(&self.path).map_err(|_| ConfigError::MissingFile {
            path: self.path.clone(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        if raw.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: self.path.clone(),
                line: None,
                message: "configuration file is empty".to_string(),
            });
        }

        serde_json::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: self.path.clone(),
            line: Some(e.line()),
            message: e.to_string(),
        })
    }

    /// Loads, validates and deserializes the document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] with the full error list if
    /// the document is structurally invalid, or a read/parse error.
    pub fn load(&self) -> Result<GameConfig, ConfigError> {
        let document = self.read_document()?;
        let errors = validate_document(&document);
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError {
                path: self.path.display().to_string(),
                errors,
            });
        }
        let config = GameConfig::from_value(document)?;
        debug!(path = %self.path.display(), name = %config.general.name, "configuration loaded");
        Ok(config)
    }

    /// Durably writes `config` to the loader's path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PersistFailed`] if any step of the write fails;
    /// the previous file is left untouched in that case.
    pub fn persist(&self, config: &GameConfig) -> Result<(), ConfigError> {
        persist_config(&self.path, config)
    }
}

/// Writes `config` to `path` atomically (write temp, fsync, rename).
///
/// # Errors
///
/// Returns [`ConfigError::PersistFailed`] on any I/O failure. The temporary
/// file is removed on failure.
pub fn persist_config(path: &Path, config: &GameConfig) -> Result<(), ConfigError> {
    let fail = |source: std::io::Error| ConfigError::PersistFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut body = serde_json::to_vec_pretty(config).map_err(|e| fail(e.into()))?;
    body.push(b'\n');

    let tmp_path = temp_sibling(path);
    let written = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(fail(e));
    }

    debug!(path = %path.display(), bytes = body.len(), "configuration persisted");
    Ok(())
}

/// Returns `.<file name>.tmp` next to `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "config".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Reads an environment variable and parses it, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
