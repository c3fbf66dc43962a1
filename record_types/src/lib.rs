//! Record Types - Foundation Types for Declared Database Shape
//!
//! This crate holds the pure data structures describing what the records database
//! is supposed to look like: collections, their validators, their indexes, and the
//! actions a reconciliation pass may take to converge a live database onto them.
//!
//! ## Contents
//!
//! - Field rules and collection validators
//! - Index keys, directions and options
//! - Collection specifications
//! - Reconciliation actions and plans
//!
//! ## Rules
//!
//! 1. **NO I/O** - nothing here talks to a database
//! 2. **NO WORKSPACE DEPENDENCIES** - the root crate depends on this one, never the reverse
//! 3. **SERIALIZABLE** - every type derives serde so plans can be logged verbatim

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// FIELD TYPES AND RULES
// ============================================================================

/// BSON type names accepted by `$jsonSchema` validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BsonType {
    String,
    Int,
    Long,
    Double,
    Decimal,
    /// Alias matching any numeric type
    Number,
    Bool,
    Date,
    Object,
    Array,
    Null,
}

impl BsonType {
    /// Name used in a `bsonType` clause
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Decimal => "decimal",
            BsonType::Number => "number",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::Null => "null",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BsonType::Int | BsonType::Long | BsonType::Double | BsonType::Decimal | BsonType::Number
        )
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint on a single document field
///
/// A field is constrained by its allowed BSON types, an enumeration of allowed values,
/// or both. Object-typed fields may carry nested field rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<BsonType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<FieldRule>,
}

impl FieldRule {
    /// Field restricted to one BSON type
    pub fn typed(name: impl Into<String>, bson_type: BsonType) -> Self {
        Self::any_of(name, &[bson_type])
    }

    /// Field accepting any of the given BSON types
    pub fn any_of(name: impl Into<String>, types: &[BsonType]) -> Self {
        Self {
            name: name.into(),
            types: types.to_vec(),
            enumeration: Vec::new(),
            pattern: None,
            minimum: None,
            properties: Vec::new(),
        }
    }

    /// Field that may be the given type or null
    pub fn nullable(name: impl Into<String>, bson_type: BsonType) -> Self {
        Self::any_of(name, &[bson_type, BsonType::Null])
    }

    /// Field restricted to an enumeration of string values
    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            enumeration: values.iter().map(|v| v.to_string()).collect(),
            ..Self::any_of(name, &[])
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_properties(mut self, properties: Vec<FieldRule>) -> Self {
        self.properties = properties;
        self
    }

    /// True when the rule admits object values
    pub fn allows_object(&self) -> bool {
        self.types.contains(&BsonType::Object)
    }

    /// True when every non-null type is numeric
    pub fn is_numeric(&self) -> bool {
        let mut non_null = self.types.iter().filter(|t| **t != BsonType::Null).peekable();
        non_null.peek().is_some() && non_null.all(BsonType::is_numeric)
    }
}

/// Document validator for a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    /// Fields every document must carry
    pub required: Vec<String>,
    /// Per-field constraints, in declaration order
    pub properties: Vec<FieldRule>,
}

impl Validator {
    pub fn new(required: &[&str], properties: Vec<FieldRule>) -> Self {
        Self {
            required: required.iter().map(|r| r.to_string()).collect(),
            properties,
        }
    }

    /// Look up a top-level field rule by name
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.properties.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// INDEXES
// ============================================================================

/// Direction (or special kind) of one index key component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDirection {
    Ascending,
    Descending,
    /// Non-ordered index kinds such as `"text"` or `"2dsphere"`
    Special(String),
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDirection::Ascending => write!(f, "asc"),
            IndexDirection::Descending => write!(f, "desc"),
            IndexDirection::Special(kind) => write!(f, "{}", kind),
        }
    }
}

/// One `(field, direction)` component of an index key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: IndexDirection,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, direction: IndexDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, IndexDirection::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, IndexDirection::Descending)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.field, self.direction)
    }
}

/// Options that distinguish two indexes sharing a key tuple
///
/// Absent options on a live index read as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexOptions {
    pub unique: bool,
    pub sparse: bool,
}

impl fmt::Display for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{unique: {}, sparse: {}}}", self.unique, self.sparse)
    }
}

/// Declared index: ordered key tuple plus options
///
/// Identity is the ordered key tuple alone. Names are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
    pub options: IndexOptions,
}

impl IndexSpec {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self {
            keys,
            options: IndexOptions::default(),
        }
    }

    /// Single-field ascending index
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(vec![IndexKey::ascending(field)])
    }

    /// Single-field descending index
    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(vec![IndexKey::descending(field)])
    }

    /// Append another key component
    pub fn then(mut self, key: IndexKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.options.sparse = true;
        self
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", KeyTuple(&self.keys))
    }
}

/// Display adapter rendering a key tuple as `[(a, asc), (b, desc)]`
pub struct KeyTuple<'a>(pub &'a [IndexKey]);

impl fmt::Display for KeyTuple<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Desired shape of one named collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub validator: Validator,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, validator: Validator, indexes: Vec<IndexSpec>) -> Self {
        Self {
            name: name.into(),
            validator,
            indexes,
        }
    }
}

// ============================================================================
// RECONCILIATION ACTIONS
// ============================================================================

/// Reason attached to an index whose key matches but whose options do not
pub const DIVERGENT_INDEX_OPTIONS: &str = "divergent index options";

/// One step of a reconciliation plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconciliationAction {
    CreateCollection {
        collection: String,
        validator: Validator,
    },
    CreateIndex {
        collection: String,
        index: IndexSpec,
    },
    /// Declared index already present with the same options
    Skip {
        collection: String,
        keys: Vec<IndexKey>,
    },
    /// Declared index present with different options; left as it is
    SkipWithWarning {
        collection: String,
        keys: Vec<IndexKey>,
        reason: String,
    },
}

impl ReconciliationAction {
    pub fn collection(&self) -> &str {
        match self {
            ReconciliationAction::CreateCollection { collection, .. }
            | ReconciliationAction::CreateIndex { collection, .. }
            | ReconciliationAction::Skip { collection, .. }
            | ReconciliationAction::SkipWithWarning { collection, .. } => collection,
        }
    }

    /// True for actions that change the live database
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ReconciliationAction::CreateCollection { .. } | ReconciliationAction::CreateIndex { .. }
        )
    }
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationAction::CreateCollection { collection, .. } => {
                write!(f, "create collection {}", collection)
            }
            ReconciliationAction::CreateIndex { collection, index } => {
                write!(f, "create index {} on {} {}", index, collection, index.options)
            }
            ReconciliationAction::Skip { collection, keys } => {
                write!(f, "skip index {} on {}", KeyTuple(keys), collection)
            }
            ReconciliationAction::SkipWithWarning {
                collection,
                keys,
                reason,
            } => write!(f, "skip index {} on {}: {}", KeyTuple(keys), collection, reason),
        }
    }
}

/// Ordered list of actions produced by one planning pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub actions: Vec<ReconciliationAction>,
}

impl ReconciliationPlan {
    pub fn new(actions: Vec<ReconciliationAction>) -> Self {
        Self { actions }
    }

    /// Actions that would change the live database
    pub fn writes(&self) -> impl Iterator<Item = &ReconciliationAction> {
        self.actions.iter().filter(|a| a.is_write())
    }

    /// True when applying the plan would change nothing
    pub fn is_converged(&self) -> bool {
        self.writes().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReconciliationAction> {
        self.actions.iter()
    }
}

impl<'a> IntoIterator for &'a ReconciliationPlan {
    type Item = &'a ReconciliationAction;
    type IntoIter = std::slice::Iter<'a, ReconciliationAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================
