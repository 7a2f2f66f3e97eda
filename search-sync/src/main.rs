//! Search Sync Main Entry Point
//!
//! Reindexes model collections into the search index.

use clap::Parser;
use dotenv::dotenv;
use search_sync::{Dependencies, ReindexArgs, ReindexCommand, SyncError};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
///
/// `--quiet` lowers the default filter to warnings.
fn init_tracing(quiet: bool) -> Result<(), SyncError> {
    let default_filter = if quiet {
        "search_sync=warn,search_sync_repository=warn"
    } else {
        "search_sync=info,search_sync_repository=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_output = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| SyncError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "search-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| SyncError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "search-sync",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    // Load environment variables from .env file
    dotenv().ok();

    let args = ReindexArgs::parse();
    init_tracing(args.quiet)?;

    info!(models = %args.models, force = args.force, "Starting search sync");

    let deps = match Dependencies::new(&args.models_dir).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let command = ReindexCommand::new(args);
    match command.run(&deps.connection, &deps.registry).await {
        Ok(reports) => {
            let indexed: usize = reports.iter().map(|r| r.summary.succeeded).sum();
            let failed: usize = reports.iter().map(|r| r.summary.failed).sum();
            info!(models = reports.len(), indexed, failed, "Reindex completed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Reindex failed");
            Err(e)
        }
    }
}
