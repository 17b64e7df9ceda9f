//
// src/proxy/pool.rs
//

use super::proxy::ProxyError;
use crate::load_balancer::LoadBalancer;
use std::sync::Arc;
use tokio::sync::RwLock;

/// `host:port` of one backend.
pub type BackendAddress = String;

/// The configured backends plus the subset currently passing health checks.
///
/// The healthy list is kept in configuration order, so selection depends
/// only on which backends are healthy and not on which probe finished first.
#[derive(Clone)]
pub struct BackendPool {
    servers: Arc<[BackendAddress]>,
    healthy_backends: Arc<RwLock<Vec<BackendAddress>>>,
}

impl BackendPool {
    pub fn new(servers: Vec<BackendAddress>) -> Self {
        let mut unique: Vec<BackendAddress> = Vec::with_capacity(servers.len());
        for server in servers {
            if !unique.contains(&server) {
                unique.push(server);
            }
        }

        Self {
            servers: unique.into(),
            healthy_backends: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn all_backends(&self) -> &[BackendAddress] {
        &self.servers
    }

    pub async fn get_healthy_backends(&self) -> Vec<BackendAddress> {
        self.healthy_backends.read().await.clone()
    }

    pub async fn healthy_count(&self) -> usize {
        self.healthy_backends.read().await.len()
    }

    pub async fn is_healthy(&self, backend: &str) -> bool {
        self.healthy_backends.read().await.iter().any(|b| b == backend)
    }

    /// Records a probe outcome. Returns `true` when membership changed.
    ///
    /// Addresses outside the configured pool are ignored.
    pub async fn set_health(&self, backend: &str, healthy: bool) -> bool {
        let Some(rank) = self.position(backend) else {
            tracing::warn!(backend, "Ignoring health update for unknown backend");
            return false;
        };

        let mut healthy_backends = self.healthy_backends.write().await;
        let present = healthy_backends.iter().position(|b| b == backend);

        match (healthy, present) {
            (true, None) => {
                let at = healthy_backends
                    .iter()
                    .position(|b| self.position(b).map_or(false, |r| r > rank))
                    .unwrap_or(healthy_backends.len());
                healthy_backends.insert(at, backend.to_string());
                true
            }
            (false, Some(idx)) => {
                healthy_backends.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Picks a backend for `identity` under the read lock.
    pub async fn select(
        &self,
        balancer: &dyn LoadBalancer,
        identity: &[u8],
    ) -> Result<BackendAddress, ProxyError> {
        let healthy = self.healthy_backends.read().await;
        balancer
            .select_backend(&healthy, identity)
            .cloned()
            .ok_or(ProxyError::NoHealthyBackends)
    }

    fn position(&self, backend: &str) -> Option<usize> {
        self.servers.iter().position(|b| b == backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::HashBalancer;

    fn pool() -> BackendPool {
        BackendPool::new(vec![
            "server1:8080".to_string(),
            "server2:8080".to_string(),
            "server3:8080".to_string(),
        ])
    }

    #[tokio::test]
    async fn starts_empty() {
        let pool = pool();
        assert_eq!(pool.all_backends().len(), 3);
        assert!(pool.get_healthy_backends().await.is_empty());
    }

    #[tokio::test]
    async fn add_is_idempotent_and_remove_is_exact() {
        let pool = pool();

        assert!(pool.set_health("server2:8080", true).await);
        assert!(!pool.set_health("server2:8080", true).await);
        assert_eq!(pool.get_healthy_backends().await, vec!["server2:8080"]);

        assert!(!pool.set_health("server1:8080", false).await);
        assert!(pool.set_health("server2:8080", false).await);
        assert!(pool.get_healthy_backends().await.is_empty());
    }

    #[tokio::test]
    async fn healthy_list_follows_config_order() {
        let pool = pool();
        pool.set_health("server3:8080", true).await;
        pool.set_health("server1:8080", true).await;
        pool.set_health("server2:8080", true).await;

        assert_eq!(
            pool.get_healthy_backends().await,
            vec!["server1:8080", "server2:8080", "server3:8080"]
        );
    }

    #[tokio::test]
    async fn unknown_backend_is_ignored() {
        let pool = pool();
        assert!(!pool.set_health("intruder:1", true).await);
        assert!(!pool.is_healthy("intruder:1").await);
    }

    #[tokio::test]
    async fn duplicate_config_entries_collapse() {
        let pool = BackendPool::new(vec!["a:1".to_string(), "a:1".to_string()]);
        assert_eq!(pool.all_backends().to_vec(), vec!["a:1".to_string()]);
    }

    #[tokio::test]
    async fn select_fails_on_empty_set() {
        let pool = pool();
        let err = pool.select(&HashBalancer::new(), b"127.0.0.1:12345").await;
        assert!(matches!(err, Err(ProxyError::NoHealthyBackends)));
    }

    #[tokio::test]
    async fn select_never_returns_removed_backend() {
        let pool = pool();
        for server in ["server1:8080", "server2:8080", "server3:8080"] {
            pool.set_health(server, true).await;
        }
        pool.set_health("server2:8080", false).await;

        let lb = HashBalancer::new();
        for i in 0..200 {
            let identity = format!("client-{}", i);
            let chosen = pool.select(&lb, identity.as_bytes()).await.unwrap();
            assert_ne!(chosen, "server2:8080");
        }
    }

    #[tokio::test]
    async fn select_is_sticky_for_fixed_membership() {
        let pool = pool();
        pool.set_health("server1:8080", true).await;
        pool.set_health("server3:8080", true).await;

        let lb = HashBalancer::new();
        let first = pool.select(&lb, b"client-123").await.unwrap();
        for _ in 0..10 {
            assert_eq!(pool.select(&lb, b"client-123").await.unwrap(), first);
        }
    }
}
