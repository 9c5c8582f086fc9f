//! Use-counted proxy pool: load from file, liveness-validate, hand out and
//! reclaim endpoints, and self-refill from the same source file once
//! exhausted.

mod config;
mod pool;

pub use config::{ProxyAuthentication, ProxyConfig, ProxyConfigBuilder};
pub use pool::ProxyPool;
