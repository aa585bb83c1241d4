//! Order Loader - Loads order events into the delivery warehouse
//!
//! Responsibilities:
//! - Read the order CSV and validate its columns
//! - Complete partial timestamps and drop rows without order/delivery time
//! - Upsert customer, driver and restaurant keys
//! - Insert time and fact rows in one transaction, rolling back on failure
//!
//! Usage:
//!   # Defaults: ./data.csv, DB_URL from the environment or .env
//!   cargo run --bin order-loader
//!
//!   # Load without a database
//!   cargo run --bin order-loader -- --input orders.csv --dry-run

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use order_loader::config::LoaderConfig;
use order_loader::input::read_orders_file;
use order_loader::store::{MemoryStore, PgStore, WarehouseStore};
use order_loader::{LoadCoordinator, LoadError, LoadReport};

#[derive(Parser, Debug)]
#[command(name = "order-loader", about = "Loads order events into the delivery warehouse")]
struct Args {
    /// Order CSV, one row per order event
    #[arg(long, env = "ORDERS_CSV", default_value = "data.csv")]
    input: PathBuf,

    /// Postgres connection url
    #[arg(long, env = "DB_URL", hide_env_values = true)]
    db_url: Option<String>,

    /// Date whose year and month complete "D HH:MM:SS" timestamps (default: today)
    #[arg(long, env = "LOAD_REFERENCE_DATE")]
    reference_date: Option<NaiveDate>,

    /// Dry run - load into an in-memory warehouse, don't touch the database
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

impl From<Args> for LoaderConfig {
    fn from(args: Args) -> Self {
        LoaderConfig {
            input: args.input,
            db_url: args.db_url.filter(|url| !url.trim().is_empty()),
            reference_date: args.reference_date,
            dry_run: args.dry_run,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: &LoaderConfig) -> Result<LoadReport, LoadError> {
    let mut coordinator = LoadCoordinator::new(config.datetime_parser());
    info!(reference_date = %config.reference_date(), "loading order data");

    let table = read_orders_file(&config.input).await?;
    let batch = coordinator.prepare(table)?;

    let mut store: Box<dyn WarehouseStore> = if config.dry_run {
        info!("dry run - loading into in-memory warehouse");
        Box::new(MemoryStore::new())
    } else {
        info!("connecting to warehouse");
        let store = PgStore::connect(config.db_url()?)
            .await
            .map_err(LoadError::Connectivity)?;
        Box::new(store)
    };

    coordinator.run(store.as_mut(), batch).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let config = LoaderConfig::from(Args::parse());

    let report = match run(&config).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "order load failed");
            return Err(anyhow::Error::new(e).context("order load failed"));
        }
    };

    let dims = serde_json::to_string(&report.dimensions).context("serializing dimension stats")?;
    info!(
        rows_read = report.rows_read,
        dropped = report.rows_missing_timestamps,
        skipped = report.skipped.len(),
        time_rows = report.time_rows,
        fact_rows = report.fact_rows,
        dimensions = %dims,
        "=== Load Complete ==="
    );

    Ok(())
}
