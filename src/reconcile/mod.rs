//! Database bootstrap
//!
//! Runs once at startup, strictly before the application serves anything:
//!
//! 1. inspect the live database
//! 2. plan the changes needed to match the [`SchemaRegistry`]
//! 3. apply them in order, aborting on the first failure
//! 4. seed empty reference collections
//! 5. read back the course catalogue
//!
//! Any error aborts startup. Created collections and indexes are never dropped or
//! altered here, and a live index whose key matches a declared one but whose options
//! differ is reported and left in place.

pub mod executor;
pub mod inspector;
pub mod planner;
pub mod seed_loader;

pub use executor::{execute, ExecutionReport};
pub use inspector::{inspect, LiveSnapshot};
pub use planner::plan;
pub use seed_loader::{load_seeds, SeedOutcome};

use crate::database::DatabaseManager;
use crate::error::BootstrapError;
use crate::repository::Course;
use crate::schema::SchemaRegistry;
use record_types::ReconciliationPlan;
use serde::Serialize;
use tracing::{error, info};

/// Everything one bootstrap pass did
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub database: String,
    pub plan: ReconciliationPlan,
    pub execution: ExecutionReport,
    pub seeds: Vec<SeedOutcome>,
    pub courses: Vec<Course>,
}

/// Compute the plan for the current live state without writing anything
pub async fn plan_only(
    manager: &DatabaseManager,
    registry: &SchemaRegistry,
) -> Result<ReconciliationPlan, BootstrapError> {
    let snapshot = inspect(manager.store(), registry).await?;
    Ok(plan(registry, &snapshot))
}

/// Bring the live database into agreement with the registry and seed reference data
pub async fn initialize_database(
    manager: &DatabaseManager,
    registry: &SchemaRegistry,
) -> Result<BootstrapReport, BootstrapError> {
    let result = run(manager, registry).await;
    if let Err(e) = &result {
        error!("Failed to initialize database {}: {}", manager.database_name(), e);
    }
    result
}

async fn run(
    manager: &DatabaseManager,
    registry: &SchemaRegistry,
) -> Result<BootstrapReport, BootstrapError> {
    let store = manager.store();
    info!("Reconciling database: {}", manager.database_name());

    let snapshot = inspect(store, registry).await?;
    let plan = plan(registry, &snapshot);
    info!(
        "Planned {} action(s), {} write(s)",
        plan.len(),
        plan.writes().count()
    );

    let execution = execute(store, &plan).await?;
    let seeds = load_seeds(store, registry.seeds()).await?;
    let courses = manager
        .repository()
        .load_courses()
        .await
        .map_err(BootstrapError::Catalogue)?;

    info!(
        "Database ready: {} collection(s) and {} index(es) created, {} divergent index(es), {} course(s) loaded",
        execution.collections_created,
        execution.indexes_created,
        execution.warnings,
        courses.len()
    );

    Ok(BootstrapReport {
        database: manager.database_name().to_string(),
        plan,
        execution,
        seeds,
        courses,
    })
}
