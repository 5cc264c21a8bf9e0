//! Portfolio browser -- HTTP API over an S3 bucket.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use portfolio_browser::browse::BrowseService;
use portfolio_browser::config::{Config, LoggingConfig};
use portfolio_browser::storage::aws::S3Store;
use portfolio_browser::storage::backend::ObjectStore;
use portfolio_browser::storage::memory::MemoryStore;

/// Command-line arguments for the portfolio browser.
#[derive(Parser, Debug)]
#[command(
    name = "portfolio-browser",
    version,
    about = "Folder-style HTTP API over an S3 bucket"
)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply when it is absent.
    #[arg(short, long, default_value = "portfolio-browser.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = portfolio_browser::config::load_config_or_default(&cli.config)?;
    config.apply_env_overrides(|name| std::env::var(name).ok());

    init_tracing(&config.logging);
    info!("Configuration loaded from {}", cli.config);

    let bind_addr = cli
        .bind
        .clone()
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        portfolio_browser::metrics::init_metrics()?;
        portfolio_browser::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let store = build_store(&config).await?;
    let browse = BrowseService::new(store, config.browse.opportunities_segment.clone());
    let state = Arc::new(portfolio_browser::AppState { config, browse });

    let app = portfolio_browser::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Portfolio browser listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Portfolio browser shut down");

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Construct the object store selected by `storage.backend`.
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "aws" => {
            let aws_config = config.storage.aws.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "storage.backend is 'aws' but storage.aws config section is missing"
                )
            })?;
            let store = S3Store::new(aws_config).await?;
            info!(
                "S3 object store initialized: bucket={} region={}",
                aws_config.bucket, aws_config.region
            );
            Ok(Arc::new(store))
        }
        "memory" => {
            let max = config.storage.memory.max_size_bytes;
            info!("In-memory object store initialized (max_size_bytes={max})");
            Ok(Arc::new(MemoryStore::new(max)))
        }
        other => anyhow::bail!("unknown storage backend '{other}'"),
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
