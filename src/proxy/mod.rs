//
// src/proxy/mod.rs
//
mod forwarder;
mod pool;
mod proxy;

pub use forwarder::{ForwardError, Forwarder, RelayError};
pub use pool::{BackendAddress, BackendPool};
pub use proxy::{ClientAddr, Proxy, ProxyError};
