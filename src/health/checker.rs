// src/health/checker.rs
use super::prober::Probe;
use crate::config::HealthCheckConfig;
use crate::metrics::MetricsCollector;
use crate::proxy::{BackendAddress, BackendPool};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

/// Keeps the pool's healthy set in line with probe results.
///
/// Every backend gets its own task and its own timer, so a probe that
/// hangs until its timeout only delays the next probe of that backend.
pub struct HealthChecker {
    pool: BackendPool,
    prober: Arc<dyn Probe>,
    interval: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthChecker {
    pub fn new(
        config: &HealthCheckConfig,
        pool: BackendPool,
        prober: Arc<dyn Probe>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            pool,
            prober,
            interval: config.interval(),
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawns one probing task per configured backend.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "Starting health checker for {} backends with interval: {:?}",
            self.pool.all_backends().len(),
            self.interval
        );

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_counts(0, self.pool.all_backends().len());
        }

        self.pool
            .all_backends()
            .iter()
            .cloned()
            .map(|backend| tokio::spawn(self.clone().run_backend(backend)))
            .collect()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn run_backend(self: Arc<Self>, backend: BackendAddress) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped(&mut shutdown_rx) => break,
            }

            tokio::select! {
                _ = self.check_backend(&backend) => {}
                _ = stopped(&mut shutdown_rx) => break,
            }
        }

        info!(backend = %backend, "Health checker shutting down");
    }

    async fn check_backend(&self, backend: &str) {
        let healthy = self.prober.probe(backend).await;
        info!(backend, healthy, "Health probe");

        if self.pool.set_health(backend, healthy).await {
            if healthy {
                info!("Backend {} is now healthy", backend);
            } else {
                warn!("Backend {} is now unhealthy", backend);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_health(backend, healthy);
            metrics.update_backend_counts(
                self.pool.healthy_count().await,
                self.pool.all_backends().len(),
            );
        }
    }
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
