//! Tunnel client library.
//!
//! Connects outbound to a burrow-relay, filters tunneled requests
//! against an exact-match allow list, dispatches the allowed ones to a
//! local service, and keeps the connection alive with keepalives and a
//! jittered reconnect loop.

pub mod backoff;
pub mod config;
pub mod filter;
pub mod forward;
pub mod tunnel;
