//! Live state inspection

use crate::database::{DocumentStore, LiveIndex};
use crate::error::BootstrapError;
use crate::schema::SchemaRegistry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error};

/// What the live database looks like, restricted to what planning needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub collections: BTreeSet<String>,
    /// Normalized indexes of each declared collection that exists
    pub indexes: BTreeMap<String, Vec<LiveIndex>>,
}

impl LiveSnapshot {
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains(name)
    }

    pub fn indexes_for(&self, collection: &str) -> &[LiveIndex] {
        self.indexes
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub async fn list_collections(store: &dyn DocumentStore) -> Result<BTreeSet<String>, BootstrapError> {
    let names = store.list_collection_names().await.map_err(|e| {
        error!("Failed to list collections in {}: {}", store.database_name(), e);
        BootstrapError::ListCollections(e)
    })?;
    Ok(names.into_iter().collect())
}

pub async fn list_indexes(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<LiveIndex>, BootstrapError> {
    store.list_indexes(collection).await.map_err(|e| {
        error!("Failed to list indexes on {}: {}", collection, e);
        BootstrapError::ListIndexes {
            collection: collection.to_string(),
            source: e,
        }
    })
}

/// Read the collection set and the indexes of every declared collection present
pub async fn inspect(
    store: &dyn DocumentStore,
    registry: &SchemaRegistry,
) -> Result<LiveSnapshot, BootstrapError> {
    let collections = list_collections(store).await?;
    let mut indexes = BTreeMap::new();
    for spec in registry.collections() {
        if !collections.contains(&spec.name) {
            continue;
        }
        let live = list_indexes(store, &spec.name).await?;
        debug!("{} has {} index(es)", spec.name, live.len());
        indexes.insert(spec.name.clone(), live);
    }
    Ok(LiveSnapshot {
        collections,
        indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use bson::doc;
    use record_types::{IndexKey, IndexSpec};

    #[tokio::test]
    async fn test_inspect_empty_database() {
        let store = MemoryStore::new("minirecords");
        let registry = SchemaRegistry::records().unwrap();
        let snapshot = inspect(&store, &registry).await.unwrap();
        assert!(snapshot.collections.is_empty());
        assert!(snapshot.indexes.is_empty());
        assert!(snapshot.indexes_for("users").is_empty());
    }

    #[tokio::test]
    async fn test_inspect_reads_only_declared_collections() {
        let store = MemoryStore::new("minirecords");
        store.create_collection("users", &doc! {}).await.unwrap();
        store.create_collection("sessions", &doc! {}).await.unwrap();
        store
            .create_index("users", &IndexSpec::ascending("email").unique())
            .await
            .unwrap();

        let registry = SchemaRegistry::records().unwrap();
        let snapshot = inspect(&store, &registry).await.unwrap();

        assert!(snapshot.has_collection("sessions"));
        assert!(!snapshot.indexes.contains_key("sessions"));

        let keys: Vec<&Vec<IndexKey>> = snapshot.indexes_for("users").iter().map(|i| &i.keys).collect();
        assert_eq!(
            keys,
            vec![&vec![IndexKey::ascending("_id")], &vec![IndexKey::ascending("email")]]
        );
        assert!(snapshot.indexes_for("users")[1].options.unique);
    }
}
