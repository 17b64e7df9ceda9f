// src/load_balancer/algorithm.rs
use crate::proxy::BackendAddress;

/// Picks one backend out of the healthy snapshot for a client identity.
///
/// Implementations must be deterministic over the slice they are given:
/// the same `backends` and `identity` always yield the same backend.
pub trait LoadBalancer: Send + Sync {
    fn select_backend<'a>(
        &self,
        backends: &'a [BackendAddress],
        identity: &[u8],
    ) -> Option<&'a BackendAddress>;

    fn name(&self) -> &'static str;
}
