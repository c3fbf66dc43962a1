//! Reconciliation planning
//!
//! A pure function of the registry and a live snapshot. Collections are visited in
//! declaration order and indexes in declaration order within each collection, so the
//! same inputs always produce the same plan regardless of how the store enumerates
//! its collections.

use super::inspector::LiveSnapshot;
use crate::database::LiveIndex;
use crate::schema::SchemaRegistry;
use record_types::{
    CollectionSpec, IndexSpec, ReconciliationAction, ReconciliationPlan, DIVERGENT_INDEX_OPTIONS,
};

pub fn plan(registry: &SchemaRegistry, snapshot: &LiveSnapshot) -> ReconciliationPlan {
    let mut actions = Vec::new();
    for spec in registry.collections() {
        plan_collection(spec, snapshot, &mut actions);
    }
    ReconciliationPlan::new(actions)
}

fn plan_collection(
    spec: &CollectionSpec,
    snapshot: &LiveSnapshot,
    actions: &mut Vec<ReconciliationAction>,
) {
    if !snapshot.has_collection(&spec.name) {
        actions.push(ReconciliationAction::CreateCollection {
            collection: spec.name.clone(),
            validator: spec.validator.clone(),
        });
    }

    let live = snapshot.indexes_for(&spec.name);
    for index in &spec.indexes {
        actions.push(plan_index(&spec.name, index, live));
    }
}

/// Match a declared index against live indexes by ordered key tuple.
///
/// A store may hold several indexes on one key pattern when they differ in collation
/// or partial filter; any exact options match among them counts as present.
pub fn plan_index(collection: &str, declared: &IndexSpec, live: &[LiveIndex]) -> ReconciliationAction {
    let mut same_keys = live.iter().filter(|existing| existing.keys == declared.keys).peekable();
    if same_keys.peek().is_none() {
        return ReconciliationAction::CreateIndex {
            collection: collection.to_string(),
            index: declared.clone(),
        };
    }
    if same_keys.any(|existing| existing.options == declared.options) {
        ReconciliationAction::Skip {
            collection: collection.to_string(),
            keys: declared.keys.clone(),
        }
    } else {
        ReconciliationAction::SkipWithWarning {
            collection: collection.to_string(),
            keys: declared.keys.clone(),
            reason: DIVERGENT_INDEX_OPTIONS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use record_types::{IndexKey, IndexOptions};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::records().unwrap()
    }

    /// Snapshot as it would look after the plan's writes succeeded
    fn converge(snapshot: &LiveSnapshot, plan: &ReconciliationPlan) -> LiveSnapshot {
        let mut next = snapshot.clone();
        for action in plan {
            match action {
                ReconciliationAction::CreateCollection { collection, .. } => {
                    next.collections.insert(collection.clone());
                    next.indexes.entry(collection.clone()).or_insert_with(|| {
                        vec![LiveIndex::new(vec![IndexKey::ascending("_id")], IndexOptions::default())]
                    });
                }
                ReconciliationAction::CreateIndex { collection, index } => {
                    next.indexes
                        .entry(collection.clone())
                        .or_default()
                        .push(LiveIndex::from(index));
                }
                _ => {}
            }
        }
        next
    }

    #[test]
    fn test_empty_database_plan() {
        let plan = plan(&registry(), &LiveSnapshot::default());
        let created: Vec<&str> = plan
            .iter()
            .filter_map(|a| match a {
                ReconciliationAction::CreateCollection { collection, .. } => Some(collection.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            created,
            vec!["users", "records", "cashflows", "inventory", "coin_transactions", "audit_logs"]
        );
        let index_creates = plan
            .iter()
            .filter(|a| matches!(a, ReconciliationAction::CreateIndex { .. }))
            .count();
        assert_eq!(index_creates, 13);
        assert_eq!(plan.len(), 19);
    }

    #[test]
    fn test_collection_creation_precedes_its_indexes() {
        let plan = plan(&registry(), &LiveSnapshot::default());
        for (position, action) in plan.iter().enumerate() {
            if let ReconciliationAction::CreateIndex { collection, .. } = action {
                let created_at = plan.iter().position(|a| {
                    matches!(a, ReconciliationAction::CreateCollection { collection: c, .. } if c == collection)
                });
                assert!(created_at.unwrap() < position);
            }
        }
    }

    #[test]
    fn test_exact_match_is_skipped() {
        let live = vec![LiveIndex::new(
            vec![IndexKey::ascending("email")],
            IndexOptions { unique: true, sparse: false },
        )];
        let action = plan_index("users", &IndexSpec::ascending("email").unique(), &live);
        assert_eq!(
            action,
            ReconciliationAction::Skip {
                collection: "users".into(),
                keys: vec![IndexKey::ascending("email")],
            }
        );
    }

    #[test]
    fn test_divergent_options_warn_without_write() {
        let live = vec![LiveIndex::new(
            vec![IndexKey::ascending("reset_token")],
            IndexOptions::default(),
        )];
        let action = plan_index("users", &IndexSpec::ascending("reset_token").sparse(), &live);
        assert_eq!(
            action,
            ReconciliationAction::SkipWithWarning {
                collection: "users".into(),
                keys: vec![IndexKey::ascending("reset_token")],
                reason: "divergent index options".into(),
            }
        );
        assert!(!action.is_write());
    }

    #[test]
    fn test_exact_match_wins_over_earlier_divergent_index() {
        let live = vec![
            LiveIndex::new(vec![IndexKey::ascending("email")], IndexOptions::default()),
            LiveIndex::new(
                vec![IndexKey::ascending("email")],
                IndexOptions { unique: true, sparse: false },
            ),
        ];
        let action = plan_index("users", &IndexSpec::ascending("email").unique(), &live);
        assert_eq!(
            action,
            ReconciliationAction::Skip {
                collection: "users".into(),
                keys: vec![IndexKey::ascending("email")],
            }
        );
    }

    #[test]
    fn test_key_order_and_direction_matter() {
        let declared = IndexSpec::ascending("user_id").then(IndexKey::ascending("type"));
        let reversed = vec![LiveIndex::new(
            vec![IndexKey::ascending("type"), IndexKey::ascending("user_id")],
            IndexOptions::default(),
        )];
        assert!(plan_index("records", &declared, &reversed).is_write());

        let descending = vec![LiveIndex::new(
            vec![IndexKey::descending("created_at")],
            IndexOptions::default(),
        )];
        assert!(plan_index("records", &IndexSpec::ascending("created_at"), &descending).is_write());
    }

    #[test]
    fn test_plan_ignores_collection_enumeration_order() {
        let mut a = LiveSnapshot::default();
        let mut b = LiveSnapshot::default();
        for name in ["audit_logs", "users", "extra"] {
            a.collections.insert(name.to_string());
        }
        for name in ["extra", "users", "audit_logs"] {
            b.collections.insert(name.to_string());
        }
        assert_eq!(plan(&registry(), &a), plan(&registry(), &b));
    }

    fn arb_snapshot() -> impl Strategy<Value = LiveSnapshot> {
        let declared: Vec<(String, Vec<IndexSpec>)> = registry()
            .collections()
            .iter()
            .map(|c| (c.name.clone(), c.indexes.clone()))
            .collect();
        let choices = declared.len();
        (
            proptest::collection::vec(any::<bool>(), choices),
            proptest::collection::vec(proptest::collection::vec(0u8..3, 3), choices),
        )
            .prop_map(move |(present, index_states)| {
                let mut snapshot = LiveSnapshot::default();
                for (i, (name, indexes)) in declared.iter().enumerate() {
                    if !present[i] {
                        continue;
                    }
                    snapshot.collections.insert(name.clone());
                    let mut live = vec![LiveIndex::new(
                        vec![IndexKey::ascending("_id")],
                        IndexOptions::default(),
                    )];
                    for (j, index) in indexes.iter().enumerate() {
                        // 0 = absent, 1 = matching, 2 = divergent options
                        match index_states[i][j] {
                            1 => live.push(LiveIndex::from(index)),
                            2 => live.push(LiveIndex::new(
                                index.keys.clone(),
                                IndexOptions {
                                    unique: !index.options.unique,
                                    sparse: index.options.sparse,
                                },
                            )),
                            _ => {}
                        }
                    }
                    snapshot.indexes.insert(name.clone(), live);
                }
                snapshot
            })
    }

    proptest! {
        #[test]
        fn prop_replanning_after_convergence_writes_nothing(snapshot in arb_snapshot()) {
            let registry = registry();
            let first = plan(&registry, &snapshot);
            let converged = converge(&snapshot, &first);
            let second = plan(&registry, &converged);
            prop_assert!(second.is_converged());
            prop_assert_eq!(second.len(), registry.index_count());
        }

        #[test]
        fn prop_every_declared_key_present_after_convergence(snapshot in arb_snapshot()) {
            let registry = registry();
            let converged = converge(&snapshot, &plan(&registry, &snapshot));
            for spec in registry.collections() {
                prop_assert!(converged.has_collection(&spec.name));
                for index in &spec.indexes {
                    prop_assert!(converged.indexes_for(&spec.name).iter().any(|l| l.keys == index.keys));
                }
            }
        }

        #[test]
        fn prop_planning_is_deterministic(snapshot in arb_snapshot()) {
            let registry = registry();
            prop_assert_eq!(plan(&registry, &snapshot), plan(&registry, &snapshot));
        }
    }
}
