// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::proxy::ClientAddr;
use crate::server::listener::bind_tcp;
use anyhow::{Context, Result};
use hyper::{server::conn::Http, service::service_fn, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::{Service, ServiceExt};

/// Pause after a failed `accept` (e.g. out of file descriptors).
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder pattern so `main.rs` can inject its Proxy (or any handler).
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    /// Inject your request handler (usually wraps `proxy::Proxy`).
    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = bind_tcp(self.addr).await?;
        self.serve_on(listener, signal).await
    }

    /// Serve connections accepted on an already bound listener.
    ///
    /// Each connection gets its own task; every request on it carries the
    /// peer address as a [`ClientAddr`] extension.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        tokio::pin!(signal);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        accept_backoff(&err).await;
                        continue;
                    }
                },
                _ = &mut signal => {
                    tracing::info!("HTTP server stopped accepting connections");
                    return Ok(());
                }
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                let svc = service_fn(move |mut req: Request<Body>| {
                    req.extensions_mut().insert(ClientAddr(peer));
                    handler.clone().oneshot(req)
                });

                if let Err(err) = Http::new().serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}

async fn accept_backoff(err: &std::io::Error) {
    tracing::warn!(%err, "accept error, retrying in {:?}", ACCEPT_BACKOFF);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
