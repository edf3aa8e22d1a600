//! Configuration module.
//!
//! Loads, validates and persists the game configuration document that
//! defines the room: devices, timers, events, hints and cameras.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, persist_config};
pub use schema::*;
pub use validation::{Validator, validate_document};
