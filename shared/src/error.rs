//! Error types shared by the relay and client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unauthorized")]
    AuthRejected,

    #[error("no tunnel connected")]
    NoTunnel,

    #[error("tunnel connection lost")]
    ConnectionLost,

    #[error("tunnel timeout")]
    UpstreamTimeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
