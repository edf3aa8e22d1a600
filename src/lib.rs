//! `roomkeeper` - coordinator for an escape room's device fleet
//!
//! Holds the authoritative game state (devices, rules, timers and the room
//! configuration), answers operator-console instructions and relays device
//! reports over a publish/subscribe bus.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod message;
pub mod observability;
pub mod router;
pub mod server;
pub mod store;
pub mod timer;
