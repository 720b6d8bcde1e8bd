//! # World Verification Tests
//!
//! Scenario checks across entity identity, storage and queries:
//!
//! 1. **Index reuse**: freed slots come back lowest first, one generation on
//! 2. **Removal purge**: a removed entity leaves no component, tag or
//!    singleton behind
//! 3. **Snapshots**: identity state survives the binary and TOML encodings
//! 4. **Cursor invalidation**: structural edits during a walk fail loud
//!
//! Run with: cargo test -p strata_core --test world_verification

use strata_core::{Component, CoreError, Entity, EntityFilter, EntityManagerSnapshot, World};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(u32);
impl Component for Health {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frozen;
impl Component for Frozen {}

// ============================================================================
// INDEX REUSE
// ============================================================================

#[test]
fn verify_index_reuse_after_bulk_removal() {
    let mut world = World::new();
    let entities: Vec<Entity> = (0..1000).map(|_| world.create()).collect();

    for &index in &[512, 0, 53] {
        assert!(world.remove(entities[index]));
    }
    assert_eq!(world.alive_count(), 997);

    let reused: Vec<Entity> = (0..3).map(|_| world.create()).collect();
    let indexes: Vec<u32> = reused.iter().map(|e| e.index()).collect();
    assert_eq!(indexes, vec![0, 53, 512]);
    assert!(reused.iter().all(|e| e.generation() == 1));

    assert!(!world.is_alive(entities[53]));
    assert_eq!(world.create().index(), 1000);
}

// ============================================================================
// REMOVAL PURGE
// ============================================================================

#[test]
fn verify_remove_purges_components_and_tags() {
    let mut world = World::new();
    let boss = world.create_with((Health(900), Frozen));
    world.attach_tags(boss, ["enemy", "elite"]);
    world.attach_singleton_tag(boss, "boss");

    let filter = EntityFilter::new().all::<Health>().all_tags(["enemy"]);
    assert_eq!(world.select(&filter), vec![boss]);

    assert!(world.remove(boss));
    assert!(world.select(&filter).is_empty());
    assert!(world.entity_by_singleton_tag("boss").is_none());
    assert!(world.pool::<Health>().unwrap().is_empty());

    // The recycled slot starts clean.
    let minion = world.create();
    assert_eq!(minion.index(), boss.index());
    assert!(!world.has::<Health>(minion));
    assert!(!world.has_tag(minion, "enemy"));
    assert!(world.get::<Health>(boss).is_none());
}

#[test]
fn verify_select_excludes_frozen() {
    let mut world = World::new();
    let mut expected = Vec::new();
    for i in 0..100u32 {
        let e = world.create_with((Health(i),));
        if i % 3 == 0 {
            world.attach(e, Frozen);
        } else {
            expected.push(e);
        }
    }

    let filter = EntityFilter::new().all::<Health>().none::<Frozen>();
    assert_eq!(world.select(&filter), expected);
    assert_eq!(world.select_entity_indexes(&filter).count_ones(), expected.len());
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

#[test]
fn verify_snapshot_encodings_restore_identity() {
    let mut world = World::new();
    let entities: Vec<Entity> = (0..64).map(|_| world.create()).collect();
    for e in entities.iter().step_by(5) {
        world.remove(*e);
    }
    let recycled = world.create();

    let snapshot = world.snapshot();
    let from_bytes = EntityManagerSnapshot::from_bytes(&snapshot.to_bytes()).unwrap();
    let from_toml: EntityManagerSnapshot =
        toml::from_str(&toml::to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(from_bytes, snapshot);
    assert_eq!(from_toml, snapshot);

    let restored = World::from_snapshot(&from_bytes);
    assert!(restored.is_alive(recycled));
    for index in 0..64 {
        assert_eq!(restored.entity_by_index(index), world.entity_by_index(index));
        let e = world.entity_by_index(index);
        assert_eq!(restored.is_alive(e), world.is_alive(e));
    }

    let truncated = &snapshot.to_bytes()[..12];
    assert!(matches!(
        EntityManagerSnapshot::from_bytes(truncated),
        Err(CoreError::MalformedSnapshot(_))
    ));
}

// ============================================================================
// CURSOR INVALIDATION
// ============================================================================

#[test]
fn verify_cursor_detects_structural_edit() {
    let mut world = World::new();
    let a = world.create_with((Health(1),));
    let b = world.create_with((Health(2),));

    let pool = world.pool::<Health>().unwrap();
    let mut cursor = pool.cursor();
    assert_eq!(pool.advance(&mut cursor).unwrap(), Some((a, &Health(1))));

    // Value edits are not structural.
    *world.get_mut::<Health>(b).unwrap() = Health(20);
    let pool = world.pool::<Health>().unwrap();
    assert_eq!(pool.advance(&mut cursor).unwrap(), Some((b, &Health(20))));
    assert_eq!(pool.advance(&mut cursor).unwrap(), None);

    let mut cursor = pool.cursor();
    world.detach::<Health>(a);
    let pool = world.pool::<Health>().unwrap();
    assert!(matches!(
        pool.advance(&mut cursor),
        Err(CoreError::ConcurrentModification { .. })
    ));
}
