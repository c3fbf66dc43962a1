//! In-process document store
//!
//! Mirrors the parts of MongoDB behaviour reconciliation depends on: collections are
//! created with an `_id_` index, re-creating a collection is rejected, re-creating an
//! index with identical options is a no-op while differing options are rejected, and
//! unique indexes reject duplicate inserts. Validators are stored but not enforced.
//!
//! Every write is appended to a log so tests can assert exactly which operations a
//! reconciliation pass issued.

use super::store::{default_index_name, DocumentStore, LiveIndex, ProbeOutcome, SortKey, SortOrder};
use crate::error::StoreError;
use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use record_types::{IndexKey, IndexOptions, IndexSpec};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

/// Scripted behaviour of the liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeScript {
    Healthy,
    /// The first `n` probes fail transiently, later ones succeed
    TransientFor(u32),
    AlwaysTransient,
    Fatal(String),
}

/// Write operation recorded by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    CreateCollection { collection: String },
    CreateIndex { collection: String, keys: Vec<IndexKey> },
    Insert { collection: String, count: usize },
}

#[derive(Debug, Clone)]
struct NamedIndex {
    name: String,
    keys: Vec<IndexKey>,
    options: IndexOptions,
}

#[derive(Debug, Default)]
struct MemoryCollection {
    validator: Option<Document>,
    indexes: Vec<NamedIndex>,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new(validator: Option<Document>) -> Self {
        Self {
            validator,
            indexes: vec![NamedIndex {
                name: "_id_".to_string(),
                keys: vec![IndexKey::ascending("_id")],
                options: IndexOptions::default(),
            }],
            documents: Vec::new(),
        }
    }

    /// Check a candidate document against `_id` and every unique index
    fn check_unique(&self, candidate: &Document) -> Result<(), StoreError> {
        for index in &self.indexes {
            let is_id = index.name == "_id_";
            if !is_id && !index.options.unique {
                continue;
            }
            let candidate_key = index_key_values(candidate, &index.keys);
            if index.options.sparse && candidate_key.iter().all(Option::is_none) {
                continue;
            }
            let clash = self
                .documents
                .iter()
                .any(|existing| index_key_values(existing, &index.keys) == candidate_key);
            if clash {
                return Err(StoreError::DuplicateKey {
                    message: format!("E11000 duplicate key error index: {}", index.name),
                });
            }
        }
        Ok(())
    }
}

fn index_key_values<'a>(document: &'a Document, keys: &[IndexKey]) -> Vec<Option<&'a Bson>> {
    keys.iter().map(|key| document.get(&key.field)).collect()
}

#[derive(Debug)]
struct MemoryState {
    collections: BTreeMap<String, MemoryCollection>,
    probe: ProbeScript,
    probes: u32,
    rejected: BTreeSet<String>,
    writes: Vec<WriteOp>,
}

/// In-memory [`DocumentStore`] for tests and dry runs
#[derive(Debug)]
pub struct MemoryStore {
    database_name: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self::with_probe(database_name, ProbeScript::Healthy)
    }

    pub fn with_probe(database_name: impl Into<String>, probe: ProbeScript) -> Self {
        Self {
            database_name: database_name.into(),
            state: Mutex::new(MemoryState {
                collections: BTreeMap::new(),
                probe,
                probes: 0,
                rejected: BTreeSet::new(),
                writes: Vec::new(),
            }),
        }
    }

    /// Make every subsequent write touching `collection` fail as if permission were denied
    pub async fn reject_writes_to(&self, collection: &str) {
        self.state.lock().await.rejected.insert(collection.to_string());
    }

    /// Number of liveness probes received so far
    pub async fn probe_count(&self) -> u32 {
        self.state.lock().await.probes
    }

    pub async fn write_log(&self) -> Vec<WriteOp> {
        self.state.lock().await.writes.clone()
    }

    pub async fn clear_write_log(&self) {
        self.state.lock().await.writes.clear();
    }

    /// Validator a collection was created with, if any
    pub async fn validator(&self, collection: &str) -> Option<Document> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .and_then(|c| c.validator.clone())
    }

    /// Name the store assigned to the index with the given key tuple
    pub async fn index_name(&self, collection: &str, keys: &[IndexKey]) -> Option<String> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)?
            .indexes
            .iter()
            .find(|index| index.keys == keys)
            .map(|index| index.name.clone())
    }
}

impl MemoryState {
    fn guard_write(&self, collection: &str) -> Result<(), StoreError> {
        if self.rejected.contains(collection) {
            return Err(StoreError::rejected(format!(
                "not authorized to modify '{}'",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    async fn ping(&self) -> ProbeOutcome {
        let mut state = self.state.lock().await;
        state.probes += 1;
        let attempt = state.probes;
        match &state.probe {
            ProbeScript::Healthy => ProbeOutcome::Ready,
            ProbeScript::TransientFor(n) if attempt <= *n => {
                ProbeOutcome::Transient(format!("server selection timeout (probe {})", attempt))
            }
            ProbeScript::TransientFor(_) => ProbeOutcome::Ready,
            ProbeScript::AlwaysTransient => {
                ProbeOutcome::Transient(format!("server selection timeout (probe {})", attempt))
            }
            ProbeScript::Fatal(message) => ProbeOutcome::Fatal(message.clone()),
        }
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state.lock().await.collections.keys().cloned().collect())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<LiveIndex>, StoreError> {
        let state = self.state.lock().await;
        let existing = state.collections.get(collection).ok_or_else(|| {
            StoreError::rejected(format!("ns does not exist: {}", collection))
        })?;
        Ok(existing
            .indexes
            .iter()
            .map(|index| LiveIndex::new(index.keys.clone(), index.options))
            .collect())
    }

    async fn create_collection(
        &self,
        collection: &str,
        validator: &Document,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.guard_write(collection)?;
        if state.collections.contains_key(collection) {
            return Err(StoreError::AlreadyExists {
                message: format!("collection '{}' already exists", collection),
            });
        }
        state
            .collections
            .insert(collection.to_string(), MemoryCollection::new(Some(validator.clone())));
        state.writes.push(WriteOp::CreateCollection {
            collection: collection.to_string(),
        });
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.guard_write(collection)?;
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(None));

        if let Some(existing) = target.indexes.iter().find(|i| i.keys == index.keys) {
            if existing.options == index.options {
                return Ok(());
            }
            return Err(StoreError::rejected(format!(
                "index options conflict: an index with name '{}' already exists with different options",
                existing.name
            )));
        }

        if index.options.unique {
            let mut seen = Vec::new();
            for document in &target.documents {
                let values = index_key_values(document, &index.keys);
                if index.options.sparse && values.iter().all(Option::is_none) {
                    continue;
                }
                if seen.contains(&values) {
                    return Err(StoreError::DuplicateKey {
                        message: format!(
                            "E11000 duplicate key error building index {}",
                            default_index_name(&index.keys)
                        ),
                    });
                }
                seen.push(values);
            }
        }

        target.indexes.push(NamedIndex {
            name: default_index_name(&index.keys),
            keys: index.keys.clone(),
            options: index.options,
        });
        state.writes.push(WriteOp::CreateIndex {
            collection: collection.to_string(),
            keys: index.keys.clone(),
        });
        Ok(())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.documents.len() as u64)
            .unwrap_or(0))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let mut state = self.state.lock().await;
        state.guard_write(collection)?;
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(None));
        let document = with_object_id(document);
        target.check_unique(&document)?;
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        target.documents.push(document);
        state.writes.push(WriteOp::Insert {
            collection: collection.to_string(),
            count: 1,
        });
        Ok(id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError> {
        if documents.is_empty() {
            return Err(StoreError::rejected("cannot insert an empty batch"));
        }
        let mut state = self.state.lock().await;
        state.guard_write(collection)?;
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(None));

        // Validate the whole batch first so a rejected batch leaves nothing behind
        let staged: Vec<Document> = documents.into_iter().map(with_object_id).collect();
        for (i, document) in staged.iter().enumerate() {
            target.check_unique(document)?;
            let batch_clash = staged[..i]
                .iter()
                .any(|earlier| earlier.get("_id") == document.get("_id"));
            if batch_clash {
                return Err(StoreError::DuplicateKey {
                    message: "E11000 duplicate key error index: _id_".to_string(),
                });
            }
        }
        let count = staged.len();
        target.documents.extend(staged);
        state.writes.push(WriteOp::Insert {
            collection: collection.to_string(),
            count,
        });
        Ok(count)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortKey>,
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state.lock().await;
        let mut matches: Vec<Document> = state
            .collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| matches_filter(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = sort {
            matches.sort_by(|a, b| {
                let ordering = compare_bson(a.get(sort.field), b.get(sort.field));
                match sort.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
        Ok(matches)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.collections.get(collection).and_then(|c| {
            c.documents
                .iter()
                .find(|d| matches_filter(d, &filter))
                .cloned()
        }))
    }
}

fn with_object_id(mut document: Document) -> Document {
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
    document
}

/// Top-level equality match, the only filter shape the accessors issue
fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    fn numeric(value: &Bson) -> Option<f64> {
        match value {
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            Bson::Double(v) => Some(*v),
            _ => None,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Bson::String(x), Bson::String(y)) => x.cmp(y),
            (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
            (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
            _ => match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
    }
}
