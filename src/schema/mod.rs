//! Desired schema registry
//!
//! The registry is the single, compiled-in declaration of what the records database
//! must look like: one [`CollectionSpec`] per application collection plus the seed
//! sets for the reference collections. Declarations are checked when the registry is
//! built, so a malformed declaration stops startup before any database call is made.

pub mod collections;
pub mod seeds;
pub mod validator;

pub use seeds::SeedSet;
pub use validator::render_validator;

use crate::error::ValidationDefinitionError;
use record_types::{CollectionSpec, FieldRule, IndexSpec, KeyTuple, Validator};
use std::collections::HashSet;
use tracing::error;

/// Validated set of collection declarations and seed sets
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    collections: Vec<CollectionSpec>,
    seeds: Vec<SeedSet>,
}

impl SchemaRegistry {
    /// Build a registry, rejecting malformed declarations
    pub fn new(
        collections: Vec<CollectionSpec>,
        seeds: Vec<SeedSet>,
    ) -> Result<Self, ValidationDefinitionError> {
        check_declarations(&collections, &seeds)
            .inspect_err(|e| error!("Invalid schema declaration: {}", e))?;
        Ok(Self { collections, seeds })
    }

    /// The records application's declared schema
    pub fn records() -> Result<Self, ValidationDefinitionError> {
        Self::new(
            collections::declared_collections(),
            seeds::declared_seed_sets(),
        )
    }

    /// Collections in declaration order
    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn seeds(&self) -> &[SeedSet] {
        &self.seeds
    }

    /// Total number of declared indexes across all collections
    pub fn index_count(&self) -> usize {
        self.collections.iter().map(|c| c.indexes.len()).sum()
    }
}

fn check_declarations(
    collections: &[CollectionSpec],
    seeds: &[SeedSet],
) -> Result<(), ValidationDefinitionError> {
    let mut names = HashSet::new();
    for spec in collections {
        if spec.name.is_empty() {
            return Err(ValidationDefinitionError::EmptyCollectionName);
        }
        if !names.insert(spec.name.as_str()) {
            return Err(ValidationDefinitionError::DuplicateCollection {
                collection: spec.name.clone(),
            });
        }
        check_validator(&spec.name, &spec.validator)?;
        check_indexes(spec)?;
    }

    let mut seeded = HashSet::new();
    for seed in seeds {
        if seed.collection.is_empty() {
            return Err(ValidationDefinitionError::EmptyCollectionName);
        }
        if !seeded.insert(seed.collection.as_str()) {
            return Err(ValidationDefinitionError::DuplicateSeedSet {
                collection: seed.collection.clone(),
            });
        }
        if seed.documents.is_empty() {
            return Err(ValidationDefinitionError::EmptySeedSet {
                collection: seed.collection.clone(),
            });
        }
    }
    Ok(())
}

fn check_validator(collection: &str, validator: &Validator) -> Result<(), ValidationDefinitionError> {
    check_fields(collection, "", &validator.properties)?;
    for required in &validator.required {
        if validator.field(required).is_none() {
            return Err(ValidationDefinitionError::UndeclaredRequiredField {
                collection: collection.to_string(),
                field: required.clone(),
            });
        }
    }
    Ok(())
}

fn check_fields(
    collection: &str,
    prefix: &str,
    rules: &[FieldRule],
) -> Result<(), ValidationDefinitionError> {
    let mut seen = HashSet::new();
    for rule in rules {
        let path = format!("{}{}", prefix, rule.name);
        let err_field = || path.clone();

        if !seen.insert(rule.name.as_str()) {
            return Err(ValidationDefinitionError::DuplicateField {
                collection: collection.to_string(),
                field: err_field(),
            });
        }
        if rule.types.is_empty() && rule.enumeration.is_empty() {
            return Err(ValidationDefinitionError::UnconstrainedField {
                collection: collection.to_string(),
                field: err_field(),
            });
        }
        if rule.minimum.is_some() && !rule.is_numeric() {
            return Err(ValidationDefinitionError::MinimumOnNonNumeric {
                collection: collection.to_string(),
                field: err_field(),
            });
        }
        if let Some(pattern) = &rule.pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ValidationDefinitionError::InvalidPattern {
                    collection: collection.to_string(),
                    field: err_field(),
                    message: e.to_string(),
                });
            }
        }
        if !rule.properties.is_empty() {
            if !rule.allows_object() {
                return Err(ValidationDefinitionError::NestedPropertiesOnNonObject {
                    collection: collection.to_string(),
                    field: err_field(),
                });
            }
            check_fields(collection, &format!("{}.", path), &rule.properties)?;
        }
    }
    Ok(())
}

fn check_indexes(spec: &CollectionSpec) -> Result<(), ValidationDefinitionError> {
    let mut tuples: Vec<&IndexSpec> = Vec::new();
    for index in &spec.indexes {
        let keys = KeyTuple(&index.keys).to_string();
        if index.keys.is_empty() {
            return Err(ValidationDefinitionError::EmptyIndexKey {
                collection: spec.name.clone(),
            });
        }

        let mut fields = HashSet::new();
        for key in &index.keys {
            if !fields.insert(key.field.as_str()) {
                return Err(ValidationDefinitionError::RepeatedIndexField {
                    collection: spec.name.clone(),
                    keys,
                    field: key.field.clone(),
                });
            }
            if !field_declared(&spec.validator, &key.field) {
                return Err(ValidationDefinitionError::UndeclaredIndexField {
                    collection: spec.name.clone(),
                    keys,
                    field: key.field.clone(),
                });
            }
        }

        if tuples.iter().any(|other| other.keys == index.keys) {
            return Err(ValidationDefinitionError::DuplicateIndex {
                collection: spec.name.clone(),
                keys,
            });
        }
        tuples.push(index);
    }
    Ok(())
}

/// Resolve a possibly dotted field path against the validator's rules
fn field_declared(validator: &Validator, path: &str) -> bool {
    let mut rules = validator.properties.as_slice();
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match rules.iter().find(|r| r.name == segment) {
            Some(_) if last => return true,
            Some(rule) => rules = rule.properties.as_slice(),
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use record_types::{BsonType, IndexKey};

    fn collection(validator: Validator, indexes: Vec<IndexSpec>) -> CollectionSpec {
        CollectionSpec::new("ledger", validator, indexes)
    }

    fn simple_validator() -> Validator {
        Validator::new(
            &["user_id"],
            vec![
                FieldRule::typed("user_id", BsonType::String),
                FieldRule::typed("created_at", BsonType::Date),
            ],
        )
    }

    #[test]
    fn test_records_registry_is_valid() {
        let registry = SchemaRegistry::records().unwrap();
        let names: Vec<&str> = registry.collections().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["users", "records", "cashflows", "inventory", "coin_transactions", "audit_logs"]
        );
        assert_eq!(registry.index_count(), 13);

        let seeds: Vec<(&str, usize)> = registry
            .seeds()
            .iter()
            .map(|s| (s.collection.as_str(), s.documents.len()))
            .collect();
        assert_eq!(
            seeds,
            vec![("courses", 3), ("tax_rates", 2), ("payment_locations", 1)]
        );
    }

    #[test]
    fn test_duplicate_collection_rejected() {
        let spec = collection(simple_validator(), vec![]);
        let err = SchemaRegistry::new(vec![spec.clone(), spec], vec![]).unwrap_err();
        assert_eq!(
            err,
            ValidationDefinitionError::DuplicateCollection {
                collection: "ledger".into()
            }
        );
    }

    #[test]
    fn test_required_field_must_be_declared() {
        let validator = Validator::new(&["missing"], vec![FieldRule::typed("user_id", BsonType::String)]);
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert!(matches!(
            err,
            ValidationDefinitionError::UndeclaredRequiredField { ref field, .. } if field == "missing"
        ));
    }

    #[test]
    fn test_minimum_requires_numeric_type() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::typed("name", BsonType::String).with_minimum(0.0)],
        );
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert!(matches!(err, ValidationDefinitionError::MinimumOnNonNumeric { .. }));
    }

    #[test]
    fn test_nested_properties_require_object() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::typed("details", BsonType::String)
                .with_properties(vec![FieldRule::typed("name", BsonType::String)])],
        );
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert!(matches!(err, ValidationDefinitionError::NestedPropertiesOnNonObject { .. }));
    }

    #[test]
    fn test_nested_duplicate_field_reports_path() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::nullable("details", BsonType::Object).with_properties(vec![
                FieldRule::typed("name", BsonType::String),
                FieldRule::typed("name", BsonType::String),
            ])],
        );
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert_eq!(
            err,
            ValidationDefinitionError::DuplicateField {
                collection: "ledger".into(),
                field: "details.name".into()
            }
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::typed("email", BsonType::String).with_pattern("^[a-z")],
        );
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert!(matches!(err, ValidationDefinitionError::InvalidPattern { .. }));
    }

    #[test]
    fn test_unconstrained_field_rejected() {
        let validator = Validator::new(&[], vec![FieldRule::one_of("role", &[])]);
        let err = SchemaRegistry::new(vec![collection(validator, vec![])], vec![]).unwrap_err();
        assert!(matches!(err, ValidationDefinitionError::UnconstrainedField { .. }));
    }

    #[test]
    fn test_index_checks() {
        let empty = collection(simple_validator(), vec![IndexSpec::new(vec![])]);
        assert!(matches!(
            SchemaRegistry::new(vec![empty], vec![]).unwrap_err(),
            ValidationDefinitionError::EmptyIndexKey { .. }
        ));

        let repeated = collection(
            simple_validator(),
            vec![IndexSpec::ascending("user_id").then(IndexKey::descending("user_id"))],
        );
        assert!(matches!(
            SchemaRegistry::new(vec![repeated], vec![]).unwrap_err(),
            ValidationDefinitionError::RepeatedIndexField { .. }
        ));

        let undeclared = collection(simple_validator(), vec![IndexSpec::ascending("ghost")]);
        assert!(matches!(
            SchemaRegistry::new(vec![undeclared], vec![]).unwrap_err(),
            ValidationDefinitionError::UndeclaredIndexField { .. }
        ));

        // Same key tuple with different options is still the same index
        let duplicate = collection(
            simple_validator(),
            vec![
                IndexSpec::ascending("user_id"),
                IndexSpec::ascending("user_id").unique(),
            ],
        );
        assert!(matches!(
            SchemaRegistry::new(vec![duplicate], vec![]).unwrap_err(),
            ValidationDefinitionError::DuplicateIndex { .. }
        ));
    }

    #[test]
    fn test_nested_index_field_resolves() {
        let validator = Validator::new(
            &[],
            vec![FieldRule::nullable("coordinates", BsonType::Object)
                .with_properties(vec![FieldRule::typed("lat", BsonType::Double)])],
        );
        let spec = collection(validator, vec![IndexSpec::ascending("coordinates.lat")]);
        assert!(SchemaRegistry::new(vec![spec], vec![]).is_ok());
    }

    #[test]
    fn test_seed_set_checks() {
        let empty = SeedSet::new("courses", vec![]);
        assert!(matches!(
            SchemaRegistry::new(vec![], vec![empty]).unwrap_err(),
            ValidationDefinitionError::EmptySeedSet { .. }
        ));

        let seed = SeedSet::new("courses", vec![doc! { "id": "a" }]);
        assert!(matches!(
            SchemaRegistry::new(vec![], vec![seed.clone(), seed]).unwrap_err(),
            ValidationDefinitionError::DuplicateSeedSet { .. }
        ));
    }
}
