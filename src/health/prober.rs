// src/health/prober.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// A single pass/fail health check against one backend.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, backend: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid health check url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Issues `GET {scheme}://{backend}/health` and expects exactly 200.
pub struct HttpProber {
    client: Client,
    scheme: &'static str,
    timeout: Duration,
}

impl HttpProber {
    pub const HEALTH_PATH: &'static str = "/health";

    pub fn new(scheme: &'static str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            scheme,
            timeout,
        })
    }

    pub fn health_url(&self, backend: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}{}", self.scheme, backend, Self::HEALTH_PATH))
    }

    pub async fn check(&self, backend: &str) -> Result<(), ProbeError> {
        let url = self.health_url(backend)?;

        let response = timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(ProbeError::Status(other)),
        }
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, backend: &str) -> bool {
        match self.check(backend).await {
            Ok(()) => true,
            Err(e) => {
                debug!(backend, error = %e, "Health probe failed");
                false
            }
        }
    }
}
