//! Property tests for component storage and registry teardown.
//!
//! Random sequences of storage operations are checked against a plain
//! `HashMap` model: `contains` must always reflect the net of inserts minus
//! removes, and a killed entity must vanish from every storage and every
//! iteration.

use std::collections::HashMap;

use astra_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Marker(i64);

#[derive(Debug, Clone, PartialEq)]
struct Aux(i64);

/// Operations performed against one component type.
#[derive(Debug, Clone)]
enum StorageOp {
    Insert(u32, i64),
    Remove(u32),
    Contains(u32),
}

fn storage_op_strategy() -> impl Strategy<Value = StorageOp> {
    prop_oneof![
        (1..64u32, any::<i64>()).prop_map(|(e, v)| StorageOp::Insert(e, v)),
        (1..64u32).prop_map(StorageOp::Remove),
        (1..64u32).prop_map(StorageOp::Contains),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// Invariant: `contains` reflects the net of inserts minus removes.
    #[test]
    fn contains_matches_model(ops in prop::collection::vec(storage_op_strategy(), 1..80)) {
        let mut storage: ComponentStorage<Marker> = ComponentStorage::new();
        let mut model: HashMap<u32, i64> = HashMap::new();

        for op in ops {
            match op {
                StorageOp::Insert(id, v) => {
                    storage.insert(Entity::from_raw(id), Marker(v));
                    model.insert(id, v);
                }
                StorageOp::Remove(id) => {
                    let removed = storage.remove(Entity::from_raw(id));
                    let expected = model.remove(&id);
                    prop_assert_eq!(removed.map(|m| m.0), expected);
                }
                StorageOp::Contains(id) => {
                    prop_assert_eq!(
                        storage.contains(Entity::from_raw(id)),
                        model.contains_key(&id)
                    );
                }
            }

            // The storage and the model must agree completely after every op.
            prop_assert_eq!(storage.len(), model.len());
            for (entity, marker) in storage.iter() {
                prop_assert_eq!(model.get(&entity.id()), Some(&marker.0));
            }
        }
    }

    /// Invariant: after `kill_entity(e)`, no storage reports the entity and
    /// it appears in no iteration.
    #[test]
    fn killed_entities_vanish_everywhere(
        spawn_count in 1..30usize,
        kill_picks in prop::collection::vec(0..30usize, 1..15),
    ) {
        let mut reg = Registry::new();
        reg.register_component::<Marker>();
        reg.register_component::<Aux>();

        let mut alive: Vec<Entity> = Vec::new();
        for i in 0..spawn_count {
            let e = reg.spawn_entity();
            reg.add_component(e, Marker(i as i64));
            if i % 2 == 0 {
                reg.add_component(e, Aux(-(i as i64)));
            }
            alive.push(e);
        }

        for pick in kill_picks {
            if alive.is_empty() {
                break;
            }
            let victim = alive.remove(pick % alive.len());
            reg.kill_entity(victim);

            prop_assert!(!reg.entity_exists(victim));
            prop_assert!(!reg.has_component::<Marker>(victim));
            prop_assert!(!reg.has_component::<Aux>(victim));
            prop_assert!(reg.components::<Marker>().iter().all(|(e, _)| e != victim));
            prop_assert!(reg.components::<Aux>().iter().all(|(e, _)| e != victim));
        }

        prop_assert_eq!(reg.entity_count(), alive.len());
        for &e in &alive {
            prop_assert!(reg.has_component::<Marker>(e));
        }
    }

    /// Iteration order is stable between mutations: two walks of an untouched
    /// storage yield the same sequence.
    #[test]
    fn iteration_stable_between_mutations(ids in prop::collection::btree_set(1..200u32, 1..40)) {
        let mut storage: ComponentStorage<Marker> = ComponentStorage::new();
        for &id in &ids {
            storage.insert(Entity::from_raw(id), Marker(id as i64));
        }
        let first: Vec<Entity> = storage.iter().map(|(e, _)| e).collect();
        let second: Vec<Entity> = storage.iter().map(|(e, _)| e).collect();
        prop_assert_eq!(first, second);
    }
}
