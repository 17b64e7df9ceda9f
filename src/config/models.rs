// src/config/models.rs
use anyhow::{bail, Result};
use hyper::header::HeaderName;
use hyper::http::uri::Authority;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Process-wide settings. Built once at startup and shared by `Arc`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Ceiling for every probe and every forwarded request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Reach backends over TLS.
    #[serde(default)]
    pub https: bool,

    /// Stamp forwarded responses with the backend that served them.
    #[serde(default)]
    pub trace: bool,

    #[serde(default = "default_backends")]
    pub backends: Vec<String>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Request header whose value replaces the peer address as hash input.
    #[serde(default = "default_client_header")]
    pub client_header: String,

    #[serde(default = "default_trace_header")]
    pub trace_header: String,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_port() -> u16 {
    8090
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_backends() -> Vec<String> {
    vec![
        "server1:8080".to_string(),
        "server2:8080".to_string(),
        "server3:8080".to_string(),
    ]
}

fn default_client_header() -> String {
    "X-Test-Client".to_string()
}

fn default_trace_header() -> String {
    "lb-from".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            https: false,
            trace: false,
            backends: default_backends(),
            health_check: HealthCheckConfig::default(),
            client_header: default_client_header(),
            trace_header: default_trace_header(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("at least one backend must be configured");
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.trim().is_empty() {
                bail!("backend address must not be empty");
            }
            if !seen.insert(backend.as_str()) {
                bail!("duplicate backend address: {}", backend);
            }
            match backend.parse::<Authority>() {
                Ok(authority) if authority.port_u16().is_some() && !backend.contains('@') => {}
                _ => bail!("backend address must be host:port: {:?}", backend),
            }
        }

        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.health_check.interval_secs == 0 {
            bail!("health_check.interval_secs must be greater than zero");
        }

        for (field, name) in [
            ("client_header", &self.client_header),
            ("trace_header", &self.trace_header),
        ] {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                bail!("{} is not a valid header name: {:?}", field, name);
            }
        }

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            bail!("metrics.path must start with '/'");
        }

        Ok(())
    }

    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn client_header(&self) -> HeaderName {
        HeaderName::from_bytes(self.client_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("x-test-client"))
    }

    pub fn trace_header(&self) -> HeaderName {
        HeaderName::from_bytes(self.trace_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("lb-from"))
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
