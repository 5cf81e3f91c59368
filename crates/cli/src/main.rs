use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

use batchalloc_allocation::OrderLine;
use batchalloc_core::{BatchReference, OrderReference, Sku};
use batchalloc_infra::{
    AllocationService, AppConfig, BatchRepository, ConfigError, JsonFileBatchRepository,
    PostgresBatchRepository, StoreConfig,
};

/// Allocate order lines against stock batches.
#[derive(Debug, Parser)]
#[command(name = "batchalloc", version)]
struct Cli {
    /// Human-readable logs instead of JSON.
    #[arg(long, global = true)]
    pretty_logs: bool,

    /// JSON file holding batches between runs (overrides BATCHALLOC_STATE_FILE).
    /// Ignored when USE_PERSISTENT_STORES=true.
    #[arg(long, global = true, value_name = "PATH")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a batch of stock.
    AddBatch {
        #[arg(long)]
        reference: BatchReference,
        #[arg(long)]
        sku: Sku,
        #[arg(long)]
        quantity: u64,
        /// Expected arrival (YYYY-MM-DD); omit for stock already on hand.
        #[arg(long)]
        eta: Option<NaiveDate>,
    },
    /// Allocate an order line to the best available batch.
    Allocate {
        #[arg(long)]
        order: OrderReference,
        #[arg(long)]
        sku: Sku,
        #[arg(long)]
        quantity: u64,
    },
    /// Release an order line from a batch.
    Deallocate {
        #[arg(long)]
        batch: BatchReference,
        #[arg(long)]
        order: OrderReference,
        #[arg(long)]
        sku: Sku,
        #[arg(long)]
        quantity: u64,
    },
    /// Print a batch and its allocations.
    Show {
        #[arg(long)]
        batch: BatchReference,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.pretty_logs {
        batchalloc_observability::tracing::init(batchalloc_observability::LogFormat::Pretty);
    } else {
        batchalloc_observability::init();
    }

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(path) = cli.state {
        config = config.with_state_file(path);
    }
    config.ensure_durable().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let repository = build_repository(&config, &runtime)?;
    let service = AllocationService::new(repository);

    let output = match cli.command {
        Command::AddBatch {
            reference,
            sku,
            quantity,
            eta,
        } => {
            let batch = service.add_batch(reference, sku, quantity, eta)?;
            serde_json::to_value(batch.snapshot())?
        }
        Command::Allocate {
            order,
            sku,
            quantity,
        } => {
            let batch_ref = service.allocate(OrderLine::new(order, sku, quantity))?;
            json!({ "batch_ref": batch_ref })
        }
        Command::Deallocate {
            batch,
            order,
            sku,
            quantity,
        } => {
            let line = OrderLine::new(order, sku, quantity);
            let batch = service.deallocate(&batch, &line)?;
            serde_json::to_value(batch.snapshot())?
        }
        Command::Show { batch } => serde_json::to_value(service.batch(&batch)?.snapshot())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build_repository(
    config: &AppConfig,
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<Arc<dyn BatchRepository>> {
    match &config.store {
        // Each invocation is a fresh process, so memory-only batches would be lost.
        StoreConfig::InMemory => Err(ConfigError::NotDurable.into()),
        StoreConfig::File { path } => {
            tracing::info!(path = %path.display(), "using batch state file");
            Ok(Arc::new(JsonFileBatchRepository::new(path)))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = runtime
                .block_on(
                    PgPoolOptions::new()
                        .max_connections(*max_connections)
                        .connect(database_url),
                )
                .context("failed to connect to Postgres")?;

            let repository = PostgresBatchRepository::new(pool, runtime.handle().clone());
            runtime
                .block_on(repository.migrate())
                .context("failed to prepare batch schema")?;
            Ok(Arc::new(repository))
        }
    }
}
