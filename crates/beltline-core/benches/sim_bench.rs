//! Criterion benchmarks for the tick pipeline.
//!
//! - `smelting_rows`: 50 parallel miner -> belts -> smelter -> box rows.
//! - `long_belt`: one saturated 500-segment belt, measuring lane advance.
//! - `serialize`: save and load of a warmed-up `smelting_rows` factory.

use beltline_core::factory::Factory;
use beltline_core::fixed::Fixed64;
use beltline_core::grid::{Direction, GridPosition};
use beltline_core::test_utils::*;
use criterion::{Criterion, criterion_group, criterion_main};

// ===========================================================================
// Factory builders
// ===========================================================================

/// `rows` copies of: miner, 8 belts, smelter, belt, storage box.
fn build_smelting_rows(rows: i32) -> Factory {
    let (registries, ids) = smelting_registries();
    let mut factory = fixed_factory(registries, Fixed64::ONE / Fixed64::from_num(64));
    let east = Direction::East;
    for z in 0..rows {
        let at = |x: i32| GridPosition::new(x, z * 2);
        factory.place_miner(at(0), east, ids.ore, fixed(2.0)).unwrap();
        for x in 1..=8 {
            factory.place_conveyor(at(x), east, fixed(2.0)).unwrap();
        }
        factory.place_machine(at(9), east, ids.plate_recipe).unwrap();
        factory.place_conveyor(at(10), east, Fixed64::ONE).unwrap();
        factory.place_storage(at(11), east, 10_000).unwrap();
    }
    factory
}

/// A fast miner at the head of a 500-segment belt ending in a large box,
/// run until the belt is full.
fn build_long_belt() -> Factory {
    let (mut factory, ore) = test_factory();
    factory
        .place_miner(GridPosition::new(0, 0), Direction::East, ore, fixed(8.0))
        .unwrap();
    for x in 1..=500 {
        factory
            .place_conveyor(GridPosition::new(x, 0), Direction::East, fixed(4.0))
            .unwrap();
    }
    factory
        .place_storage(GridPosition::new(501, 0), Direction::East, u32::MAX)
        .unwrap();
    run_seconds(&mut factory, fixed(130.0));
    factory
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_smelting_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("smelting_rows");
    let mut factory = build_smelting_rows(50);
    run_seconds(&mut factory, fixed(10.0));

    group.bench_function("tick_50_rows", |b| {
        b.iter(|| {
            factory.step();
        });
    });
    group.finish();
}

fn bench_long_belt(c: &mut Criterion) {
    let mut group = c.benchmark_group("long_belt");
    let mut factory = build_long_belt();

    group.bench_function("tick_500_segments", |b| {
        b.iter(|| {
            factory.step();
        });
    });
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let mut factory = build_smelting_rows(50);
    run_seconds(&mut factory, fixed(10.0));

    group.bench_function("serialize_50_rows", |b| {
        b.iter(|| {
            factory.serialize().unwrap();
        });
    });

    let data = factory.serialize().unwrap();
    let registries = factory.registries().clone();
    group.bench_function("deserialize_50_rows", |b| {
        b.iter(|| {
            Factory::deserialize(&data, registries.clone()).unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_smelting_rows, bench_long_belt, bench_serialize);
criterion_main!(benches);
