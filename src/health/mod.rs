// src/health/mod.rs
mod checker;
mod prober;

pub use checker::HealthChecker;
pub use prober::{HttpProber, Probe, ProbeError};
