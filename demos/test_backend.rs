//! demos/test_backend.rs
//! Backend for trying the balancer by hand.
//! Run: cargo run --example test_backend -- <port> [name]
//!
//! Env: `DELAY_MS`, `JITTER_MS` add latency to non-health requests;
//! `FLIP_HEALTH_SECS` toggles the `/health` answer on that period.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;
use tracing::info;

#[derive(Clone)]
struct BackendState {
    name: String,
    served: Arc<AtomicU64>,
    healthy: Arc<AtomicBool>,
    delay_ms: u64,
    jitter_ms: u64,
}

async fn handle(req: Request<Body>, state: BackendState) -> Result<Response<Body>, Infallible> {
    if req.uri().path() == "/health" {
        let status = if state.healthy.load(Ordering::SeqCst) {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        return Ok(response);
    }

    let delay = state.delay_ms + rand::thread_rng().gen_range(0..=state.jitter_ms);
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }

    let n = state.served.fetch_add(1, Ordering::SeqCst) + 1;
    let client = req
        .headers()
        .get("x-test-client")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let body = serde_json::json!({
        "backend": state.name,
        "served": n,
        "path": req.uri().path(),
        "client": client,
        "delay_ms": delay,
    });

    let mut response = Response::new(Body::from(body.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn env_u64(key: &str) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "8080".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("backend-{port}"));

    let state = BackendState {
        name: name.clone(),
        served: Arc::new(AtomicU64::new(0)),
        healthy: Arc::new(AtomicBool::new(true)),
        delay_ms: env_u64("DELAY_MS"),
        jitter_ms: env_u64("JITTER_MS"),
    };

    let flip_secs = env_u64("FLIP_HEALTH_SECS");
    if flip_secs > 0 {
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(flip_secs)).await;
                let healthy = !st.healthy.fetch_xor(true, Ordering::SeqCst);
                info!(backend = %st.name, healthy, "health flipped");
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, st.clone()))) }
    });

    info!("Backend '{}' listening on http://{}", name, addr);
    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
