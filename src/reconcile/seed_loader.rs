//! One-time seeding of reference collections

use crate::database::DocumentStore;
use crate::error::SchemaApplyError;
use crate::schema::SeedSet;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SeedOutcome {
    Inserted { collection: String, count: usize },
    /// Collection already had documents; nothing was compared or written
    AlreadyPopulated { collection: String, existing: u64 },
}

/// Seed every empty reference collection with its canonical set in a single insert.
///
/// The emptiness check is the only guard: a populated collection is never diffed
/// against its seed set.
pub async fn load_seeds(
    store: &dyn DocumentStore,
    seeds: &[SeedSet],
) -> Result<Vec<SeedOutcome>, SchemaApplyError> {
    let mut outcomes = Vec::with_capacity(seeds.len());

    for seed in seeds {
        let existing = store.count_documents(&seed.collection).await.map_err(|e| {
            error!("Failed to count documents in {}: {}", seed.collection, e);
            SchemaApplyError::SeedCount {
                collection: seed.collection.clone(),
                source: e,
            }
        })?;

        if existing > 0 {
            info!(
                "Skipping seed for {}: {} document(s) already present",
                seed.collection, existing
            );
            outcomes.push(SeedOutcome::AlreadyPopulated {
                collection: seed.collection.clone(),
                existing,
            });
            continue;
        }

        let count = store
            .insert_many(&seed.collection, seed.documents.clone())
            .await
            .map_err(|e| {
                error!("Failed to seed {}: {}", seed.collection, e);
                SchemaApplyError::SeedInsert {
                    collection: seed.collection.clone(),
                    source: e,
                }
            })?;
        info!("Initialized {} with {} document(s)", seed.collection, count);
        outcomes.push(SeedOutcome::Inserted {
            collection: seed.collection.clone(),
            count,
        });
    }

    Ok(outcomes)
}
