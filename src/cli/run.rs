use crate::config::{load_config, ConfigError};
use crate::fetch::{GcsObjectStore, LogFetcher};
use crate::load::{BigQueryWarehouse, TableReference, WarehouseLoader};
use crate::pipeline::{Pipeline, RunError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

pub async fn run(config_path: Option<PathBuf>, at: Option<DateTime<Utc>>) {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/slowq/config.yml");
            eprintln!("  /etc/slowq/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'slowq config init' to generate one.");
            std::process::exit(2);
        }
    };

    if let Err(e) = run_pipeline(&config_path, at).await {
        error!(error = %e, exit_code = e.exit_code(), "run failed");
        std::process::exit(e.exit_code());
    }
}

async fn run_pipeline(config_path: &PathBuf, at: Option<DateTime<Utc>>) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let token = std::env::var(&config.auth.token_env).map_err(|_| {
        ConfigError::Validation(format!(
            "access token environment variable '{}' is not set",
            config.auth.token_env
        ))
    })?;

    let store = GcsObjectStore::new(&config.source.endpoint, &token, config.fetch.timeout)
        .map_err(RunError::Fetch)?;
    let fetcher = LogFetcher::new(store, config.fetch.attempts, config.fetch.initial_backoff);

    let warehouse = BigQueryWarehouse::new(
        &config.warehouse.endpoint,
        &token,
        &config.warehouse.project,
        config.warehouse.timeout,
        config.warehouse.poll_interval,
    )
    .map_err(RunError::Load)?;
    let table = TableReference {
        project: config.warehouse.project.clone(),
        dataset: config.warehouse.dataset.clone(),
        table: config.warehouse.table.clone(),
    };
    let loader = WarehouseLoader::new(warehouse, table, config.warehouse.empty_batch);

    let pipeline = Pipeline::new(
        config.source.clone(),
        fetcher,
        loader,
        config.pipeline.deadline,
    );

    let now = at.unwrap_or_else(Utc::now);

    tokio::select! {
        result = pipeline.run(now) => result.map(|_| ()),
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            Err(RunError::Cancelled)
        }
    }
}
