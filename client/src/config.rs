//! Client configuration from environment variables.

use burrow_shared::{Error, Result};

use crate::filter::AllowList;

/// Everything one tunnel session needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the relay's /tunnel endpoint.
    pub server: String,
    /// Base URL of the private local service.
    pub local: String,
    /// Shared bearer secret.
    pub token: String,
    /// Exact-match (method, path) allow list.
    pub allow: AllowList,
    /// Label sent as X-Tunnel-User for log attribution. May be empty.
    pub user: String,
}

impl ClientConfig {
    /// Read TUN_SERVER, TUN_LOCAL, TUN_ALLOW, and TUN_TOKEN from the
    /// environment; all four are required.
    pub fn from_env() -> Result<Self> {
        let server = required("TUN_SERVER")?;
        if !server.starts_with("ws://") && !server.starts_with("wss://") {
            return Err(Error::Config(format!(
                "TUN_SERVER must be a ws:// or wss:// URL, got {server:?}"
            )));
        }
        let local = required("TUN_LOCAL")?;
        let allow = AllowList::parse(&required("TUN_ALLOW")?)?;
        let token = required("TUN_TOKEN")?;

        Ok(Self {
            server,
            local,
            token,
            allow,
            user: detect_user(),
        })
    }
}

fn required(key: &str) -> Result<String> {
    let value = std::env::var(key).unwrap_or_default().trim().to_string();
    if value.is_empty() {
        return Err(Error::Config(format!(
            "{key} is required (set it in the environment or .env)"
        )));
    }
    Ok(value)
}

/// Tunnel user label: `git config github.user`, falling back to $USER.
pub fn detect_user() -> String {
    if let Ok(out) = std::process::Command::new("git")
        .args(["config", "--get", "github.user"])
        .output()
    {
        if out.status.success() {
            let user = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if !user.is_empty() {
                return user;
            }
        }
    }
    std::env::var("USER").unwrap_or_default()
}
