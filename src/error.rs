//! Error types for `roomkeeper`.
//!
//! One enum per concern (configuration, store lookups, timers, message
//! decoding, bus transport) plus a top-level error that maps onto process
//! exit codes for the CLI.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `roomkeeper` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (unreadable document, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Bus transport error
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `roomkeeper` operations.
#[derive(Debug, Error)]
pub enum RoomKeeperError {
    /// Configuration loading, validation or persistence error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bus gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Store lookup error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Timer state machine error
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// Envelope decoding error
    #[error(transparent)]
    Message(#[from] MessageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RoomKeeperError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Gateway(_) => ExitCode::TRANSPORT_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Store(_) | Self::Timer(_) | Self::Message(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading, validation and persistence errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// The document failed validation
    #[error("validation failed for {path}: {}", errors.join("; "))]
    ValidationError {
        /// Where the document came from (path or `"<instruction>"`)
        path: String,
        /// Ordered list of validation errors
        errors: Vec<String>,
    },

    /// Configuration file not found or unreadable
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Writing the configuration document failed
    #[error("failed to persist configuration to {path}: {source}")]
    PersistFailed {
        /// Target path of the write
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Store Errors
// ============================================================================

/// Lookup failures against the game-state store.
///
/// A miss is always explicit so callers can tell "no such device" apart
/// from "device present with an empty status".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No device (or console) with this id
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// No event (rule) with this id
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// No timer with this id
    #[error("timer not found: {0}")]
    TimerNotFound(String),
}

// ============================================================================
// Timer Errors
// ============================================================================

/// Timer state machine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The requested transition is not allowed from the current state
    #[error("timer '{id}' cannot {action} while {state}")]
    InvalidTransition {
        /// Timer id
        id: String,
        /// Attempted action (`start`, `pause`, ...)
        action: &'static str,
        /// Current state name
        state: &'static str,
    },

    /// Lookup failure while resolving the timer
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Message Errors
// ============================================================================

/// Envelope and record decoding errors.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Payload is not a well-formed envelope
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Contents do not match the shape required by the message kind
    #[error("invalid contents for '{kind}' message: {message}")]
    InvalidContents {
        /// Wire tag of the message kind
        kind: &'static str,
        /// Decoder message
        message: String,
    },

    /// An instruction record could not be decoded
    #[error("invalid instruction record: {0}")]
    InvalidInstruction(String),
}

// ============================================================================
// Gateway Errors
// ============================================================================

/// Bus gateway (transport) errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error while writing or reading frames
    #[error("gateway I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame could not be read or exceeded the size limit
    #[error("frame error: {0}")]
    Frame(String),

    /// Gateway has been closed
    #[error("gateway closed")]
    Closed,
}

// ============================================================================
// Handler Errors
// ============================================================================

/// Failure of a single instruction or ingestion record.
///
/// Never fatal: the router logs it and moves on to the next record.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The record referenced an unknown id
    #[error(transparent)]
    Lookup(#[from] StoreError),

    /// The record requested an impossible timer transition
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// The record could not be decoded
    #[error(transparent)]
    Decode(#[from] MessageError),

    /// Encoding an outbound envelope failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `roomkeeper` operations.
pub type Result<T> = std::result::Result<T, RoomKeeperError>;

// ============================================================================
// Tests
// ============================================================================
