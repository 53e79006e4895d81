use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use acorn::config::{load_config, validate_config, AcornConfig, ConfigError, ConfigWatcher};
use acorn::http::{DispatchSettings, Dispatcher, HttpServer};
use acorn::lifecycle::{wait_for_signal, Shutdown};
use acorn::net::Listener;
use acorn::observability::init_logging;
use acorn::service;

#[derive(Debug, Parser)]
#[command(name = "acorn")]
#[command(about = "Event-driven HTTP dispatcher serving static content", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AcornConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "acorn starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        read_buffer_size = config.listener.read_buffer_size,
        static_root = %config.static_files.root.display(),
        mounts = config.mounts.len(),
        "Configuration loaded"
    );

    let dispatcher = Arc::new(Dispatcher::new(DispatchSettings {
        server_name: Arc::from(config.server.name.as_str()),
        read_buffer_size: config.listener.read_buffer_size,
    }));
    dispatcher.install(service::routes(&config)?);
    dispatcher.install_middleware(service::middleware(&config));

    // Reloads rebuild routes and middleware; listener settings stay as started.
    let (table_tx, table_rx) = mpsc::unbounded_channel();
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    match service::routes(&new_config) {
                        Ok(table) => {
                            dispatcher.install_middleware(service::middleware(&new_config));
                            if table_tx.send(table).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Reloaded config has invalid routes, keeping current table");
                        }
                    }
                }
            });
            Some(watcher)
        }
        None => {
            drop(table_tx);
            None
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(wait_for_signal(Arc::clone(&shutdown)));

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(dispatcher, config.server.clone());
    server.run(listener, table_rx, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
