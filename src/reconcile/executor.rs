//! Sequential plan application

use crate::database::DocumentStore;
use crate::error::SchemaApplyError;
use crate::schema::render_validator;
use record_types::{KeyTuple, ReconciliationAction, ReconciliationPlan};
use serde::Serialize;
use tracing::{error, info, warn};

/// Tally of what one execution pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub collections_created: usize,
    pub indexes_created: usize,
    pub skipped: usize,
    pub warnings: usize,
}

/// Apply the plan in order, stopping at the first failed action.
///
/// Nothing after a failure is attempted; the caller must treat the error as fatal.
pub async fn execute(
    store: &dyn DocumentStore,
    plan: &ReconciliationPlan,
) -> Result<ExecutionReport, SchemaApplyError> {
    let mut report = ExecutionReport::default();

    for action in plan {
        match action {
            ReconciliationAction::CreateCollection {
                collection,
                validator,
            } => {
                store
                    .create_collection(collection, &render_validator(validator))
                    .await
                    .map_err(|e| {
                        error!("Failed to create collection {}: {}", collection, e);
                        SchemaApplyError::CreateCollection {
                            collection: collection.clone(),
                            source: e,
                        }
                    })?;
                info!("Created collection: {}", collection);
                report.collections_created += 1;
            }
            ReconciliationAction::CreateIndex { collection, index } => {
                store.create_index(collection, index).await.map_err(|e| {
                    error!(
                        "Failed to create index on {}: {} with options {}: {}",
                        collection, index, index.options, e
                    );
                    SchemaApplyError::CreateIndex {
                        collection: collection.clone(),
                        keys: index.to_string(),
                        source: e,
                    }
                })?;
                info!(
                    "Created index on {}: {} with options {}",
                    collection, index, index.options
                );
                report.indexes_created += 1;
            }
            ReconciliationAction::Skip { collection, keys } => {
                info!("Index already exists on {}: {}", collection, KeyTuple(keys));
                report.skipped += 1;
            }
            ReconciliationAction::SkipWithWarning {
                collection,
                keys,
                reason,
            } => {
                warn!(
                    "Leaving index on {} untouched: {} ({})",
                    collection,
                    KeyTuple(keys),
                    reason
                );
                report.warnings += 1;
            }
        }
    }

    Ok(report)
}
