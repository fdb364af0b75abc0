//! Shared types for the burrow tunnel system.
//!
//! Defines the protocol messages exchanged between the tunnel client
//! and relay, the common error taxonomy, and the `.env` loader both
//! binaries use at startup.

pub mod env;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
