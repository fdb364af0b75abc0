//! Wire protocol between the tunnel client and relay.
//!
//! One JSON object per WebSocket text frame: a [`Request`] travelling
//! relay → client, or a [`Response`] travelling client → relay,
//! correlated by `id`. A frame that fails to decode is logged and
//! dropped by the receiver; it never tears the connection down.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// WebSocket keepalive constants.
///
/// `PING_PERIOD` must be well under `PONG_WAIT` so pings go out before
/// the read deadline expires. The 20s/60s ratio tolerates two
/// consecutive lost heartbeats before the link is declared dead.
pub const PING_PERIOD: Duration = Duration::from_secs(20);
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Header multimap. Values under one name keep their order; ordering
/// across distinct names carries no meaning.
pub type Headers = HashMap<String, Vec<String>>;

/// Request forwarded relay → client through the tunnel.
///
/// Built once per inbound external HTTP call and immutable after
/// creation. The `id` is minted by the relay and opaque to the client,
/// which echoes it unchanged in its [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    /// Path including the query string, byte-exact.
    pub path: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

/// Response travelling client → relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl Response {
    /// A response synthesized locally, without contacting any upstream.
    pub fn synthetic(id: String, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }
}

/// Bodies are binary-safe byte sequences; JSON strings are not.
/// Base64 bridges the two on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
