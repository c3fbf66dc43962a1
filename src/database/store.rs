use crate::error::StoreError;
use async_trait::async_trait;
use bson::{Bson, Document};
use record_types::{IndexDirection, IndexKey, IndexOptions, IndexSpec};

/// Result of one liveness probe
///
/// The connection supervisor counts attempts itself; backends only report what
/// happened on this attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    /// Connectivity failure that may clear on a later attempt
    Transient(String),
    /// Failure that retrying cannot fix (bad credentials, malformed target)
    Fatal(String),
}

/// Live index as reported by the store, with its name already discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveIndex {
    pub keys: Vec<IndexKey>,
    pub options: IndexOptions,
}

impl LiveIndex {
    pub fn new(keys: Vec<IndexKey>, options: IndexOptions) -> Self {
        Self { keys, options }
    }
}

impl From<&IndexSpec> for LiveIndex {
    fn from(spec: &IndexSpec) -> Self {
        Self::new(spec.keys.clone(), spec.options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Sort key for filtered finds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub order: SortOrder,
}

impl SortKey {
    pub const fn ascending(field: &'static str) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    pub const fn descending(field: &'static str) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }

    pub fn to_document(&self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.field, self.order.as_i32());
        sort
    }
}

/// Persistence seam for the records database.
///
/// Bootstrap and the record accessors operate exclusively through this trait, so the
/// live MongoDB backend and the in-memory backend used by tests are interchangeable.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn database_name(&self) -> &str;

    // ── Liveness ──

    async fn ping(&self) -> ProbeOutcome;

    // ── Shape ──

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError>;
    async fn list_indexes(&self, collection: &str) -> Result<Vec<LiveIndex>, StoreError>;
    async fn create_collection(&self, collection: &str, validator: &Document)
        -> Result<(), StoreError>;
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError>;

    // ── Documents ──

    async fn count_documents(&self, collection: &str) -> Result<u64, StoreError>;
    /// Insert one document and return its `_id`
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;
    /// Insert a batch in one operation and return how many were written. MongoDB keeps
    /// documents written before a failure; the in-memory store writes all or nothing.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>)
        -> Result<usize, StoreError>;
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortKey>,
    ) -> Result<Vec<Document>, StoreError>;
    async fn find_one(&self, collection: &str, filter: Document)
        -> Result<Option<Document>, StoreError>;
}

/// Normalize a stored key value (`1`, `-1`, `1.0`, `"text"`) into a direction
pub fn direction_from_bson(value: &Bson) -> IndexDirection {
    let numeric = match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    };
    match (numeric, value) {
        (Some(n), _) if n < 0.0 => IndexDirection::Descending,
        (Some(_), _) => IndexDirection::Ascending,
        (None, Bson::String(kind)) => IndexDirection::Special(kind.clone()),
        (None, other) => IndexDirection::Special(other.to_string()),
    }
}

pub fn direction_to_bson(direction: &IndexDirection) -> Bson {
    match direction {
        IndexDirection::Ascending => Bson::Int32(1),
        IndexDirection::Descending => Bson::Int32(-1),
        IndexDirection::Special(kind) => Bson::String(kind.clone()),
    }
}

/// Ordered key document for an index, e.g. `{ user_id: 1, type: 1 }`
pub fn keys_to_document(keys: &[IndexKey]) -> Document {
    let mut document = Document::new();
    for key in keys {
        document.insert(key.field.clone(), direction_to_bson(&key.direction));
    }
    document
}

/// Ordered key tuple from a stored key document
pub fn keys_from_document(document: &Document) -> Vec<IndexKey> {
    document
        .iter()
        .map(|(field, value)| IndexKey::new(field.clone(), direction_from_bson(value)))
        .collect()
}

/// Default index name the way MongoDB derives it (`user_id_1_type_1`)
pub fn default_index_name(keys: &[IndexKey]) -> String {
    keys.iter()
        .map(|key| {
            let suffix = match &key.direction {
                IndexDirection::Ascending => "1".to_string(),
                IndexDirection::Descending => "-1".to_string(),
                IndexDirection::Special(kind) => kind.clone(),
            };
            format!("{}_{}", key.field, suffix)
        })
        .collect::<Vec<_>>()
        .join("_")
}
