//! Error handling for database bootstrap and record access
//!
//! Every failure carries the identity of the collection or index it concerns so the
//! startup log can name the offending entity before the process aborts.

use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::database::DocumentStore) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {message}")]
    Unavailable { message: String },

    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    #[error("duplicate key: {message}")]
    DuplicateKey { message: String },

    #[error("operation rejected by store: {message}")]
    Rejected { message: String },

    #[error("document decoding failed: {message}")]
    Decode { message: String },
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        StoreError::Rejected {
            message: message.into(),
        }
    }

    /// Connectivity-class failures that are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Failure to establish a usable database handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("database unreachable after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("database connection failed: {message}")]
    Fatal { message: String },

    #[error("invalid connection configuration: {message}")]
    Configuration { message: String },
}

/// Failure applying a reconciliation action or seeding a reference collection
#[derive(Error, Debug)]
pub enum SchemaApplyError {
    #[error("failed to create collection '{collection}': {source}")]
    CreateCollection {
        collection: String,
        source: StoreError,
    },

    #[error("failed to create index {keys} on '{collection}': {source}")]
    CreateIndex {
        collection: String,
        keys: String,
        source: StoreError,
    },

    #[error("failed to count documents in seed collection '{collection}': {source}")]
    SeedCount {
        collection: String,
        source: StoreError,
    },

    #[error("failed to seed collection '{collection}': {source}")]
    SeedInsert {
        collection: String,
        source: StoreError,
    },
}

impl SchemaApplyError {
    pub fn collection(&self) -> &str {
        match self {
            SchemaApplyError::CreateCollection { collection, .. }
            | SchemaApplyError::CreateIndex { collection, .. }
            | SchemaApplyError::SeedCount { collection, .. }
            | SchemaApplyError::SeedInsert { collection, .. } => collection,
        }
    }
}

/// Malformed declared schema, detected when the registry is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationDefinitionError {
    #[error("collection name must not be empty")]
    EmptyCollectionName,

    #[error("collection '{collection}' is declared more than once")]
    DuplicateCollection { collection: String },

    #[error("field '{field}' is declared more than once in '{collection}'")]
    DuplicateField { collection: String, field: String },

    #[error("required field '{field}' has no rule in '{collection}'")]
    UndeclaredRequiredField { collection: String, field: String },

    #[error("field '{field}' in '{collection}' has neither a type nor an enumeration")]
    UnconstrainedField { collection: String, field: String },

    #[error("field '{field}' in '{collection}' sets a minimum but is not numeric")]
    MinimumOnNonNumeric { collection: String, field: String },

    #[error("field '{field}' in '{collection}' declares nested properties but cannot be an object")]
    NestedPropertiesOnNonObject { collection: String, field: String },

    #[error("field '{field}' in '{collection}' has an invalid pattern: {message}")]
    InvalidPattern {
        collection: String,
        field: String,
        message: String,
    },

    #[error("index in '{collection}' has no key fields")]
    EmptyIndexKey { collection: String },

    #[error("index {keys} in '{collection}' repeats field '{field}'")]
    RepeatedIndexField {
        collection: String,
        keys: String,
        field: String,
    },

    #[error("index {keys} in '{collection}' references undeclared field '{field}'")]
    UndeclaredIndexField {
        collection: String,
        keys: String,
        field: String,
    },

    #[error("index {keys} is declared more than once in '{collection}'")]
    DuplicateIndex { collection: String, keys: String },

    #[error("seed set for '{collection}' is declared more than once")]
    DuplicateSeedSet { collection: String },

    #[error("seed set for '{collection}' has no documents")]
    EmptySeedSet { collection: String },
}

/// Errors surfaced by the downstream record accessors
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("user with this email or username already exists")]
    UserExists,

    #[error("missing required {entity} fields: {}", fields.join(", "))]
    MissingFields {
        entity: &'static str,
        fields: Vec<String>,
    },

    #[error("invalid {entity}: {message}")]
    InvalidData {
        entity: &'static str,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Any failure that aborts database bootstrap
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    ValidationDefinition(#[from] ValidationDefinitionError),

    #[error(transparent)]
    SchemaApply(#[from] SchemaApplyError),

    #[error("failed to list collections: {0}")]
    ListCollections(#[source] StoreError),

    #[error("failed to list indexes of '{collection}': {source}")]
    ListIndexes {
        collection: String,
        source: StoreError,
    },

    #[error("failed to load course catalogue: {0}")]
    Catalogue(#[source] RepositoryError),
}
