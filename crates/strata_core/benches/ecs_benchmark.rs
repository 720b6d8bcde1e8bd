//! # ECS Performance Benchmark
//!
//! Hot paths of the storage kernel:
//! - Entity create/remove churn with index reuse
//! - Sparse-set attach/detach
//! - Bitmask filter evaluation over large populations
//!
//! Run with: `cargo bench --package strata_core`

// Benchmarks don't need docs and may carry unread fields
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::{Component, ComponentPool, Entity, EntityFilter, EntityManager, World};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Frozen;
impl Component for Frozen {}

fn populated_world(count: usize) -> World {
    let mut world = World::new();
    for i in 0..count {
        let e = world.create_with((Position { x: i as f32, y: 0.0 },));
        if i % 2 == 0 {
            world.attach(e, Velocity { dx: 1.0, dy: 0.5 });
        }
        if i % 7 == 0 {
            world.attach(e, Frozen);
        }
        if i % 3 == 0 {
            world.attach_tag(e, "visible");
        }
    }
    world
}

/// Benchmark: create N entities, remove every other one, create again.
fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for count in [10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut manager = EntityManager::new();
                let entities: Vec<Entity> = (0..count).map(|_| manager.create()).collect();
                for e in entities.iter().step_by(2) {
                    manager.remove(*e);
                }
                for _ in 0..count / 2 {
                    black_box(manager.create());
                }
                manager.alive_count()
            });
        });
    }

    group.finish();
}

/// Benchmark: attach then detach every entry of a pool.
fn bench_pool_attach_detach(c: &mut Criterion) {
    c.bench_function("pool_attach_detach_100k", |b| {
        let entities: Vec<Entity> = (0..100_000).map(|i| Entity::new(i, 0)).collect();
        b.iter(|| {
            let mut pool = ComponentPool::with_capacity(entities.len());
            for &e in &entities {
                pool.attach(e, Velocity { dx: 0.0, dy: 1.0 });
            }
            for &e in entities.iter().rev() {
                black_box(pool.detach(e));
            }
            pool.len()
        });
    });
}

/// Benchmark: the filter engine against a populated world.
fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_entity_indexes");
    let filter = EntityFilter::new()
        .all::<Position>()
        .all::<Velocity>()
        .none::<Frozen>()
        .all_tags(["visible"]);

    for count in [10_000, 100_000, 1_000_000] {
        let world = populated_world(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &world, |b, world| {
            b.iter(|| black_box(world.select_entity_indexes(&filter)).count_ones());
        });
    }

    group.finish();
}

/// Benchmark: dense iteration with in-place mutation.
fn bench_pool_iteration(c: &mut Criterion) {
    let mut world = populated_world(100_000);
    c.bench_function("pool_iter_mut_100k", |b| {
        b.iter(|| {
            if let Some(pool) = world.pool_mut::<Position>() {
                for (_, position) in pool.iter_mut() {
                    position.x += 1.0;
                    position.y += 0.5;
                }
            }
        });
    });
}

criterion_group!(
    benches,
    bench_entity_churn,
    bench_pool_attach_detach,
    bench_select,
    bench_pool_iteration,
);

criterion_main!(benches);
