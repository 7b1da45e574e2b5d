//! Image transformation proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ request id / trace / deadline
//!                         │
//!                         ▼
//!                  ┌──────────────┐   full + queue timeout
//!                  │  admission   │──────────────────────────▶ 503
//!                  │    gate      │
//!                  └──────┬───────┘
//!                         ▼
//!                  ┌──────────────┐   400 / 403
//!                  │  validate +  │──────────────▶
//!                  │  allow-list  │
//!                  └──────┬───────┘
//!                         ▼
//!                  ┌──────────────┐   502 / 413 / 500
//!                  │ origin fetch │──────────────────▶       ◀──── Origin
//!                  │  (capped)    │                                Server
//!                  └──────┬───────┘
//!                         ▼
//!                  ┌──────────────┐   If-None-Match hit
//!                  │ fingerprint  │──────────────────▶ 304
//!                  └──────┬───────┘
//!                         ▼
//!                  ┌──────────────┐   engine error / fault
//!                  │  transform   │──────────────────▶ 500
//!                  └──────┬───────┘
//!                         ▼
//!     ◀──────────── 200 image + ETag + Cache-Control
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use image_proxy::config::{load_config, ProxyConfig};
use image_proxy::http::HttpServer;
use image_proxy::lifecycle::{startup, Shutdown};
use image_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "image-proxy")]
#[command(about = "On-demand image transformation proxy", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "IMAGE_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("image-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = startup::build_runtime(&config)?;
    runtime.block_on(serve(config))
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        worker_threads = config.runtime.worker_threads,
        max_concurrent = config.admission.max_concurrent,
        queue_timeout_ms = config.admission.queue_timeout_ms,
        max_origin_bytes = config.origin.max_body_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let addr = bind_address.parse()?;
            server.run_tls(addr, &tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
