use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use cayman_mall::app::ads::expire_ads;
use cayman_mall::config::{Config, StorageBackend};
use cayman_mall::observability::metrics;
use cayman_mall::state::AppState;
use cayman_mall::storage::{InMemoryStorage, SqliteStorage, Storage};
use cayman_mall::{logging, server};

#[derive(Parser)]
#[command(name = "cayman_mall")]
#[command(about = "Mall of Cayman marketplace backend")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to $CAYMAN_CONFIG or ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the ad rotator
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create or upgrade the SQLite schema
    Migrate,
    /// Pause advertisements whose running window has ended
    ExpireAds,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("reading config from {}", path.display())),
        None => Config::load().context("loading configuration"),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(InMemoryStorage::new())
        }
        StorageBackend::Sqlite => Arc::new(
            SqliteStorage::open(&config.storage.database_path).with_context(|| {
                format!(
                    "opening database {}",
                    config.storage.database_path.display()
                )
            })?,
        ),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut config = load_config(cli.config)?;

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if config.server.metrics_enabled {
                metrics::init();
            }

            let storage = open_storage(&config)?;
            let state = AppState::new(storage, config);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let rotator = state.rotator.clone().spawn(shutdown_rx);

            let served = server::start_server(state).await;

            let _ = shutdown_tx.send(true);
            if let Err(e) = rotator.await {
                warn!("Ad rotator task ended abnormally: {e}");
            }
            served.context("HTTP server failed")?;
        }
        Commands::Migrate => {
            if config.storage.backend != StorageBackend::Sqlite {
                warn!("Storage backend is in-memory; nothing to migrate");
                return Ok(());
            }
            let storage = SqliteStorage::open(&config.storage.database_path)
                .context("opening database")?;
            storage.run_migrations().context("running migrations")?;
            info!(
                "Database ready at {}",
                config.storage.database_path.display()
            );
        }
        Commands::ExpireAds => {
            let storage = open_storage(&config)?;
            let expired = expire_ads(storage.as_ref(), Utc::now())
                .await
                .context("expiring advertisements")?;
            println!("Expired {expired} advertisement(s)");
        }
    }

    Ok(())
}
