//! Startup orchestration.
//!
//! The runtime is sized from configuration, so it is built by hand after the
//! config is loaded instead of through `#[tokio::main]`.

use tokio::runtime::{Builder, Runtime};

use crate::config::ProxyConfig;

/// Build the multi-threaded runtime that drives request tasks.
pub fn build_runtime(config: &ProxyConfig) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(config.runtime.worker_threads)
        .thread_name("image-proxy-worker")
        .enable_all()
        .build()
}
