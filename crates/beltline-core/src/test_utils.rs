//! Shared builders for unit tests, integration tests and property tests.
//!
//! Compiled for `cfg(test)` and under the `test-utils` feature.

use crate::factory::Factory;
use crate::fixed::Fixed64;
use crate::id::{ItemTypeId, RecipeId, SegmentId};
use crate::item::{LaneId, TransitItem};
use crate::registry::{ItemCategory, ItemDef, Recipe, Registries};
use crate::sim::{SimConfig, SimulationStrategy};
use std::sync::Arc;

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Registries holding a single raw resource, `iron_ore`.
pub fn ore_registries() -> (Arc<Registries>, ItemTypeId) {
    let mut reg = Registries::new();
    let ore = reg
        .add_item(ItemDef::new("iron_ore", ItemCategory::Resource))
        .expect("fresh registry accepts iron_ore");
    (reg.into_shared(), ore)
}

/// Item ids used by [`smelting_registries`].
#[derive(Debug, Clone, Copy)]
pub struct Smelting {
    pub ore: ItemTypeId,
    pub plate: ItemTypeId,
    /// `2 x iron_ore -> 1 x iron_plate`, two seconds.
    pub plate_recipe: RecipeId,
}

/// Ore, plates and a two-ore plate recipe.
pub fn smelting_registries() -> (Arc<Registries>, Smelting) {
    let mut reg = Registries::new();
    let ore = reg
        .add_item(ItemDef::new("iron_ore", ItemCategory::Resource))
        .expect("fresh registry accepts iron_ore");
    let plate = reg
        .add_item(ItemDef::new("iron_plate", ItemCategory::Intermediate))
        .expect("fresh registry accepts iron_plate");
    let plate_recipe = reg
        .add_recipe("iron_plate", Recipe::new(vec![ore], 2, plate, fixed(2.0)))
        .expect("plate recipe is valid");
    (
        reg.into_shared(),
        Smelting {
            ore,
            plate,
            plate_recipe,
        },
    )
}

/// A default-config factory with variable stepping over [`ore_registries`].
pub fn test_factory() -> (Factory, ItemTypeId) {
    let (registries, ore) = ore_registries();
    let factory = Factory::new(registries, SimConfig::default(), SimulationStrategy::Variable)
        .unwrap_or_else(|err| panic!("default config rejected: {err}"));
    (factory, ore)
}

/// A factory with a fixed timestep and the given tick length.
pub fn fixed_factory(registries: Arc<Registries>, timestep: Fixed64) -> Factory {
    let config = SimConfig {
        tick_seconds: timestep,
        ..SimConfig::default()
    };
    Factory::new(registries, config, SimulationStrategy::Fixed { timestep })
        .unwrap_or_else(|err| panic!("fixed config rejected: {err}"))
}

/// Put a fresh item at the entry of a belt lane, counted as produced so
/// unit accounting still balances. Panics if the lane entry is crowded.
pub fn inject(factory: &mut Factory, segment: SegmentId, lane: LaneId, item_type: ItemTypeId) {
    let spacing = factory.config.min_item_spacing;
    let item = TransitItem::new(factory.item_ids.allocate(), item_type, 1);
    let Some(seg) = factory.network.get_mut(segment) else {
        panic!("no segment {segment:?}");
    };
    if seg.insert(lane, item, spacing).is_err() {
        panic!("lane entry crowded on {segment:?}");
    }
    factory.stats.produced += 1;
}

/// Step until `seconds` of simulated time have passed.
pub fn run_seconds(factory: &mut Factory, seconds: Fixed64) {
    let target = factory.elapsed() + seconds;
    while factory.elapsed() < target {
        factory.step();
    }
}

/// Every unit ever produced is somewhere or was accounted for.
pub fn units_balance(factory: &Factory) -> bool {
    let stats = factory.stats();
    stats.produced
        == factory.units_in_flight()
            + factory.units_in_storage()
            + stats.consumed
            + stats.withdrawn
            + stats.discarded
}
