// ────────────────────────────────
// src/proxy/proxy.rs
// Proxy component that handles HTTP request forwarding
// ────────────────────────────────

use super::forwarder::{ForwardError, Forwarder};
use super::pool::BackendPool;
use crate::config::Config;
use crate::load_balancer::{HashBalancer, LoadBalancer};
use crate::metrics::{MetricsCollector, Timer};
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Transport peer of an inbound request, attached by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

pub struct Proxy {
    pool: BackendPool,
    balancer: Arc<dyn LoadBalancer>,
    forwarder: Forwarder,
    client_header: HeaderName,
    metrics: Arc<MetricsCollector>,
}

impl Proxy {
    pub fn new(config: &Config, pool: BackendPool, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            pool,
            balancer: Arc::new(HashBalancer::new()),
            forwarder: Forwarder::from_config(config),
            client_header: config.client_header(),
            metrics,
        }
    }

    pub fn with_balancer(mut self, balancer: Arc<dyn LoadBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// The override header when present and non-empty, else the peer address.
    pub fn client_identity(&self, req: &Request<Body>) -> Vec<u8> {
        if let Some(value) = req.headers().get(&self.client_header) {
            if !value.is_empty() {
                return value.as_bytes().to_vec();
            }
        }

        match req.extensions().get::<ClientAddr>() {
            Some(ClientAddr(peer)) => peer.to_string().into_bytes(),
            None => {
                debug!("Request carries neither identity header nor peer address");
                Vec::new()
            }
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let timer = Timer::new();
        let method = req.method().clone();
        let identity = self.client_identity(&req);

        let backend = match self.pool.select(self.balancer.as_ref(), &identity).await {
            Ok(backend) => backend,
            Err(e) => {
                warn!("{}", e);
                self.metrics.record_request(
                    method.as_str(),
                    StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    "none",
                    timer.elapsed(),
                );
                return Err(e);
            }
        };
        debug!(backend = %backend, balancer = self.balancer.name(), "Selected backend");

        match self.forwarder.forward(&backend, req).await {
            Ok(response) => {
                self.metrics.record_backend_request(&backend, true);
                self.metrics.record_request(
                    method.as_str(),
                    response.status().as_u16(),
                    &backend,
                    timer.elapsed(),
                );
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_backend_request(&backend, false);
                self.metrics.record_request(
                    method.as_str(),
                    StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    &backend,
                    timer.elapsed(),
                );
                Err(e.into())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy servers available")]
    NoHealthyBackends,

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

// Both failure kinds answer 503; only the empty pool explains itself.
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let mut response = match err {
            ProxyError::NoHealthyBackends => {
                let mut response = Response::new(Body::from(err.to_string()));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
            ProxyError::Forward(_) => Response::new(Body::empty()),
        };

        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;

    fn proxy(pool: BackendPool) -> Proxy {
        let metrics = MetricsRegistry::new().unwrap().collector();
        Proxy::new(&Config::default(), pool, metrics)
    }

    fn pool() -> BackendPool {
        BackendPool::new(vec!["server1:8080".to_string(), "server2:8080".to_string()])
    }

    #[test]
    fn identity_prefers_override_header() {
        let proxy = proxy(pool());
        let mut req = Request::builder()
            .header("X-Test-Client", "client-123")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ClientAddr("10.0.0.1:5000".parse().unwrap()));

        assert_eq!(proxy.client_identity(&req), b"client-123".to_vec());
    }

    #[test]
    fn identity_falls_back_to_peer_address() {
        let proxy = proxy(pool());
        let mut req = Request::builder()
            .header("X-Test-Client", "")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ClientAddr("10.0.0.1:5000".parse().unwrap()));

        assert_eq!(proxy.client_identity(&req), b"10.0.0.1:5000".to_vec());
    }

    #[tokio::test]
    async fn empty_pool_answers_503_with_explanation() {
        let proxy = proxy(pool());
        let err = proxy
            .handle(Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::NoHealthyBackends));

        let response = Response::from(err);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"No healthy servers available");
    }

    #[tokio::test]
    async fn unreachable_backend_answers_empty_503() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap().to_string();
        drop(listener);

        let pool = BackendPool::new(vec![dead.clone()]);
        pool.set_health(&dead, true).await;
        let proxy = proxy(pool);

        let err = proxy
            .handle(Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Forward(ForwardError::Transport { .. })));

        let response = Response::from(err);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(body.is_empty());
    }
}
