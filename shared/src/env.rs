//! `.env` loader restricted to tunnel keys.
//!
//! Imports only keys prefixed `TUN_` plus `PORT`, and never overwrites
//! variables already set in the process environment, so loading a
//! project-local file cannot clobber unrelated application state. A
//! missing file is not an error.

use std::path::Path;

use tracing::warn;

use crate::{Error, Result};

pub fn load(path: impl AsRef<Path>) -> Result<()> {
    let data = match std::fs::read_to_string(path.as_ref()) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };

    for raw in data.lines() {
        let mut line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("export ") {
            line = rest.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("env: malformed line: {line}");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!("env: malformed line: {line}");
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        if !key.starts_with("TUN_") && key != "PORT" {
            continue;
        }
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }

    Ok(())
}
