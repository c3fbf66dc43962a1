//! Database bootstrap CLI
//!
//! Connects to MongoDB, reconciles collections and indexes, and seeds reference data.
//!
//! # Usage
//!
//! ```bash
//! # Apply everything against the default local database
//! ficore-bootstrap
//!
//! # Show what would change without writing
//! ficore-bootstrap --plan-only --mongo-uri mongodb://db:27017/minirecords
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ficore_records::database::{DatabaseConfig, DatabaseManager, DEFAULT_MONGO_URI};
use ficore_records::{initialize_database, plan_only, SchemaRegistry};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ficore-bootstrap")]
#[command(version)]
#[command(about = "Reconcile the MongoDB schema and seed reference data")]
struct Cli {
    /// MongoDB connection URI, including the database name
    #[arg(long, env = "MONGO_URI", default_value = DEFAULT_MONGO_URI)]
    mongo_uri: String,

    /// Total liveness probe attempts before giving up
    #[arg(long, env = "MONGO_CONNECT_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Delay between liveness probe attempts, in milliseconds
    #[arg(long, env = "MONGO_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Print the reconciliation plan as JSON and exit without writing
    #[arg(long)]
    plan_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ficore_records=info,ficore_bootstrap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = DatabaseConfig {
        max_retries: cli.max_retries,
        retry_delay: Duration::from_millis(cli.retry_delay_ms),
        ..DatabaseConfig::with_uri(cli.mongo_uri)
    };

    let registry = SchemaRegistry::records().context("Invalid schema declaration")?;
    let manager = DatabaseManager::connect(&config)
        .await
        .inspect_err(|e| error!("Database connection failed: {}", e))
        .context("Failed to connect to MongoDB")?;

    if cli.plan_only {
        let plan = plan_only(&manager, &registry)
            .await
            .inspect_err(|e| error!("Planning failed for {}: {}", manager.database_name(), e))
            .context("Failed to plan reconciliation")?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let report = initialize_database(&manager, &registry)
        .await
        .context("Failed to initialize database")?;
    info!(
        "Bootstrap of '{}' complete: {} course(s) available",
        report.database,
        report.courses.len()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
