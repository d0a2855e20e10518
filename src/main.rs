//! # SEO Pipeline Entry Point
//!
//! `serve` runs the HTTP wrapper; the other subcommands run one pipeline
//! operation and print its JSON result, for cron or operator use.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use seo_pipeline::{
    config::{AppConfig, ConfigLoader},
    db::{health_check, init_pool},
    indexing::{GoogleIndexingClient, IndexingWorker, QueueProcessor},
    location::{canonical_key, canonical_url},
    repositories::{IndexQueueRepository, SystemConfigRepository},
    revenue::RevenueScoringEngine,
    seo,
    server::{AppState, run_server},
    telemetry::init_tracing,
};

#[derive(Debug, Parser)]
#[command(name = "seo-pipeline", version, about = "Revenue-driven SEO promotion and indexing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Also run the indexing worker in this process
        #[arg(long)]
        with_worker: bool,
    },
    /// Apply pending database migrations
    Migrate,
    /// Print the current execution plan without applying it
    Plan,
    /// Build the current execution plan and apply it
    Apply,
    /// Run the queue processor once
    ProcessQueue,
    /// Print queue health and totals
    Health,
    /// Run the queue processor on an interval until interrupted
    Worker,
    /// Turn the SEO pipeline on
    Enable,
    /// Turn the SEO pipeline off
    Disable,
    /// Queue a location's URL for indexing
    Enqueue {
        /// Location key (normalized before use)
        location: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    database: bool,
    health: seo::HealthState,
    stats: Option<seo::IndexingStats>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_processor(
    db: sea_orm::DatabaseConnection,
    config: Arc<AppConfig>,
) -> anyhow::Result<QueueProcessor> {
    let client = GoogleIndexingClient::new(&config.indexing)
        .context("failed to build indexing client")?;
    Ok(QueueProcessor::new(db, config, Arc::new(client)))
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("Shutdown signal received");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;
    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Effective configuration");
    }

    let config = Arc::new(config);
    let db = init_pool(&config).await?;

    match cli.command {
        Command::Migrate => {
            Migrator::up(&db, None).await?;
            info!("Migrations applied");
        }
        Command::Plan => {
            print_json(&seo::get_seo_execution_plan(&db, &config).await)?;
        }
        Command::Apply => {
            let plan = seo::get_seo_execution_plan(&db, &config).await;
            let report = seo::apply_seo_execution_plan(&db, &config, &plan).await;
            print_json(&report)?;
        }
        Command::ProcessQueue => {
            let processor = build_processor(db, config.clone())?;
            print_json(&processor.run().await)?;
        }
        Command::Health => {
            let database = match health_check(&db).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Database probe failed");
                    false
                }
            };
            let stats = seo::indexing_stats(&db, &config).await.ok();
            let health = seo::health_state(&db, &config).await;
            print_json(&HealthReport {
                database,
                health,
                stats,
            })?;
        }
        Command::Worker => {
            let processor = build_processor(db, config.clone())?;
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());
            IndexingWorker::new(processor, &config.indexing)
                .run(shutdown)
                .await;
        }
        Command::Serve { with_worker } => {
            let processor = build_processor(db.clone(), config.clone())?;
            let revenue = Arc::new(RevenueScoringEngine::new(db.clone(), config.revenue.clone()));
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());

            let worker = with_worker.then(|| {
                let worker = IndexingWorker::new(processor.clone(), &config.indexing);
                tokio::spawn(worker.run(shutdown.clone()))
            });

            let state = AppState {
                config: config.clone(),
                db,
                processor,
                revenue,
            };
            run_server(config, state, shutdown.clone()).await?;

            shutdown.cancel();
            if let Some(handle) = worker {
                let _ = handle.await;
            }
        }
        Command::Enable => {
            SystemConfigRepository::new(&db).set_seo_enabled(true).await?;
        }
        Command::Disable => {
            SystemConfigRepository::new(&db).set_seo_enabled(false).await?;
        }
        Command::Enqueue { location } => {
            let key = canonical_key(&location);
            anyhow::ensure!(!key.is_empty(), "location '{}' is empty after normalization", location);
            let url = canonical_url(&config.indexing, &key);
            let entry = IndexQueueRepository::new(&db).enqueue(&url, &key).await?;
            print_json(&entry)?;
        }
    }

    Ok(())
}
