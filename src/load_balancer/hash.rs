// src/load_balancer/hash.rs
use crate::load_balancer::LoadBalancer;
use crate::proxy::BackendAddress;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over raw bytes.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Maps a client identity onto `hash % len` of the healthy backends.
///
/// This is plain modulo hashing: adding or removing one backend can move
/// identities that were never on it. There is no ring.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashBalancer;

impl HashBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for HashBalancer {
    fn select_backend<'a>(
        &self,
        backends: &'a [BackendAddress],
        identity: &[u8],
    ) -> Option<&'a BackendAddress> {
        if backends.is_empty() {
            return None;
        }

        let index = fnv1a_32(identity) as usize % backends.len();
        backends.get(index)
    }

    fn name(&self) -> &'static str {
        "fnv1a_hash"
    }
}
