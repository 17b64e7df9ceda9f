// ────────────────────────────────
// src/proxy/forwarder.rs
// Re-targets one inbound request at a backend and relays the answer.
// ────────────────────────────────

use crate::config::Config;
use futures::stream;
use hyper::body::{Bytes, HttpBody};
use hyper::client::HttpConnector;
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::{Body, Client, Request, Response, Uri, Version};
use hyper_tls::HttpsConnector;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid target {backend}: {source}")]
    InvalidTarget {
        backend: String,
        source: hyper::http::Error,
    },

    #[error("failed to get response from {backend}: {source}")]
    Transport {
        backend: String,
        source: hyper::Error,
    },

    #[error("no response from {backend} within {timeout:?}")]
    Timeout { backend: String, timeout: Duration },
}

/// Failure while streaming a body whose status line is already sent.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("backend body error: {0}")]
    Body(#[from] hyper::Error),

    #[error("response body exceeded the forwarding deadline")]
    Deadline,
}

pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    scheme: &'static str,
    timeout: Duration,
    trace_header: Option<HeaderName>,
}

impl Forwarder {
    pub fn new(scheme: &'static str, timeout: Duration, trace_header: Option<HeaderName>) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());

        Self {
            client,
            scheme,
            timeout,
            trace_header,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.scheme(),
            config.timeout(),
            config.trace.then(|| config.trace_header()),
        )
    }

    /// Same method, headers and body; scheme, authority and `Host` point at
    /// `backend`. Extensions attached by the inbound connection are dropped.
    pub fn outbound_request(
        &self,
        backend: &str,
        req: Request<Body>,
    ) -> Result<Request<Body>, ForwardError> {
        let invalid = |source: hyper::http::Error| ForwardError::InvalidTarget {
            backend: backend.to_string(),
            source,
        };

        let (mut parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        parts.uri = Uri::builder()
            .scheme(self.scheme)
            .authority(backend)
            .path_and_query(path_and_query)
            .build()
            .map_err(invalid)?;

        let host = HeaderValue::from_str(backend).map_err(|e| invalid(e.into()))?;
        parts.headers.insert(HOST, host);
        parts.version = Version::HTTP_11;
        parts.extensions.clear();

        Ok(Request::from_parts(parts, body))
    }

    /// Sends `req` to `backend` and returns the backend's response.
    ///
    /// The deadline starts now and covers both the response head and the
    /// streamed body.
    pub async fn forward(
        &self,
        backend: &str,
        req: Request<Body>,
    ) -> Result<Response<Body>, ForwardError> {
        let deadline = Instant::now() + self.timeout;
        let outbound = self.outbound_request(backend, req).map_err(|e| {
            error!("Failed to build request for {}: {}", backend, e);
            e
        })?;
        let uri = outbound.uri().clone();

        let response = match timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                error!("Failed to get response from {}: {}", backend, source);
                return Err(ForwardError::Transport {
                    backend: backend.to_string(),
                    source,
                });
            }
            Err(_) => {
                error!("Failed to get response from {}: timed out after {:?}", backend, self.timeout);
                return Err(ForwardError::Timeout {
                    backend: backend.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        info!("fwd {} {}", response.status().as_u16(), uri);

        let (mut parts, body) = response.into_parts();
        if let Some(name) = &self.trace_header {
            if let Ok(value) = HeaderValue::from_str(backend) {
                parts.headers.insert(name.clone(), value);
            }
        }

        let body = if body.is_end_stream() {
            body
        } else {
            relay_body(body, deadline, backend.to_string())
        };

        Ok(Response::from_parts(parts, body))
    }
}

fn relay_body(body: Body, deadline: Instant, backend: String) -> Body {
    let chunks = stream::unfold(Some(body), move |state| {
        let backend = backend.clone();
        async move {
            let mut body = state?;
            match timeout_at(deadline, body.data()).await {
                Ok(Some(Ok(chunk))) => Some((Ok::<Bytes, RelayError>(chunk), Some(body))),
                Ok(None) => None,
                Ok(Some(Err(e))) => {
                    warn!("Failed to write response from {}: {}", backend, e);
                    Some((Err(RelayError::Body(e)), None))
                }
                Err(_) => {
                    warn!("Failed to write response from {}: {}", backend, RelayError::Deadline);
                    Some((Err(RelayError::Deadline), None))
                }
            }
        }
    });

    Body::wrap_stream(chunks)
}
