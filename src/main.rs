//! sense-backend
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum router ──▶ Supervisor::run ──▶ handler task
//!                                          │  (deadline, catch_unwind)
//!     Client Response                      ▼
//!     ◀────────────── ResponseWriter ◀── envelope | 504 timeout | 500
//! ```

use std::path::PathBuf;

use axum::extract::Request;
use clap::Parser;
use tokio::net::TcpListener;

use sense_backend::config;
use sense_backend::http::{HttpServer, JsonResponse, ResponseWriter, Routes};
use sense_backend::lifecycle::{signals, Shutdown};
use sense_backend::observability::{logging, metrics};
use sense_backend::pool::Pools;

#[derive(Parser)]
#[command(name = "sense-backend")]
#[command(version, about = "Supervised HTTP backend", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

async fn ping(_request: Request, _writer: ResponseWriter) -> Option<JsonResponse> {
    Some(JsonResponse::new().set_data("Ping!!!"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::load_or_default(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    logging::init(&config.observability);
    tracing::info!("sense-backend v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
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

    let pools = Pools::new(&config.pools);
    if !Pools::install(pools.clone()) {
        tracing::warn!("Process pools were already initialized");
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let routes = Routes::new().get("/ping", ping);
    let server = HttpServer::new(config, routes, pools);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
