// src/load_balancer/mod.rs
mod algorithm;
mod hash;

pub use algorithm::LoadBalancer;
pub use hash::{fnv1a_32, HashBalancer};
