//! Local dispatch.
//!
//! Executes an allowed tunneled request against the private service
//! and shapes the outcome into exactly one tunnel response. Rejected
//! requests are answered locally; the private service never sees them.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use burrow_shared::protocol::{Headers, Request, Response};
use burrow_shared::{Error, Result};

use crate::filter::AllowList;

/// Bound on one local round trip, independent of the relay's
/// correlator timeout.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

enum DispatchError {
    /// The request could not even be constructed.
    Build(String),
    /// The private service was unreachable or failed mid-flight.
    Transport(String),
}

pub struct Forwarder {
    http: reqwest::Client,
    local: String,
    allow: AllowList,
}

impl Forwarder {
    pub fn new(local: String, allow: AllowList) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LOCAL_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self { http, local, allow })
    }

    /// Filter, dispatch, and shape exactly one response per request.
    /// Dispatches are independent; nothing is retried or reordered.
    pub async fn handle(&self, req: Request) -> Response {
        if !self.allow.allows(&req.method, &req.path) {
            warn!("blocked: {} {}", req.method, req.path);
            return Response::synthetic(req.id, 403, "forbidden by tunnel filter");
        }

        let id = req.id.clone();
        match self.dispatch(req).await {
            Ok(resp) => resp,
            Err(DispatchError::Build(e)) => Response::synthetic(id, 500, e),
            Err(DispatchError::Transport(e)) => {
                warn!("local request error: {e}");
                Response::synthetic(id, 502, e)
            }
        }
    }

    async fn dispatch(&self, req: Request) -> std::result::Result<Response, DispatchError> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| DispatchError::Build(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, values) in &req.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DispatchError::Build(e.to_string()))?;
            for value in values {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| DispatchError::Build(e.to_string()))?;
                headers.append(name.clone(), value);
            }
        }

        let url = format!("{}{}", self.local, req.path);
        let upstream = self
            .http
            .request(method, &url)
            .headers(headers)
            .body(req.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    DispatchError::Build(e.to_string())
                } else {
                    DispatchError::Transport(e.to_string())
                }
            })?;

        let status = upstream.status().as_u16();
        let mut resp_headers = Headers::new();
        for (name, value) in upstream.headers() {
            if let Ok(value) = value.to_str() {
                resp_headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        let body = upstream
            .bytes()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Response {
            id: req.id,
            status,
            headers: resp_headers,
            body: body.to_vec(),
        })
    }
}
