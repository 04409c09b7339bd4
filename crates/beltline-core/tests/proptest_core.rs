//! Property-based tests: random belt lines and tick counts, checked against
//! the accounting, ordering and capacity invariants.

use beltline_core::factory::Factory;
use beltline_core::fixed::Fixed64;
use beltline_core::grid::{Direction, GridConfig, GridPosition, WorldPos};
use beltline_core::id::StorageId;
use beltline_core::item::LaneId;
use beltline_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
struct LineSpec {
    belts: usize,
    rate: f64,
    speed: f64,
    capacity: u32,
    turn_at: Option<usize>,
}

fn arb_line() -> impl Strategy<Value = LineSpec> {
    (
        1..6usize,
        prop::sample::select(vec![0.5, 1.0, 2.0, 4.0]),
        prop::sample::select(vec![0.5, 1.0, 2.0]),
        1..20u32,
        prop::option::of(0..5usize),
    )
        .prop_map(|(belts, rate, speed, capacity, turn_at)| LineSpec {
            belts,
            rate,
            speed,
            capacity,
            turn_at: turn_at.filter(|&t| t < belts),
        })
}

/// Miner, a run of belts (optionally turning north once), then a storage box.
fn build_line(spec: &LineSpec) -> (Factory, StorageId) {
    let (mut factory, ore) = test_factory();
    let mut cell = GridPosition::new(0, 0);
    let mut heading = Direction::East;
    factory
        .place_miner(cell, heading, ore, fixed(spec.rate))
        .unwrap();
    for i in 0..spec.belts {
        cell = cell.step(heading);
        if spec.turn_at == Some(i) {
            heading = Direction::North;
        }
        factory
            .place_conveyor(cell, heading, fixed(spec.speed))
            .unwrap();
    }
    let store = factory
        .place_storage(cell.step(heading), Direction::East, spec.capacity)
        .unwrap();
    (factory, store)
}

fn lane_ids(factory: &Factory) -> Vec<Vec<u64>> {
    factory
        .network()
        .iter()
        .flat_map(|(_, seg)| {
            LaneId::ALL
                .into_iter()
                .map(move |lane| seg.lane(lane).items().map(|i| i.id.0).collect())
        })
        .collect()
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn units_are_conserved(spec in arb_line(), ticks in 0..600usize) {
        let (mut factory, _) = build_line(&spec);
        for _ in 0..ticks {
            factory.step();
            prop_assert!(units_balance(&factory));
        }
    }

    #[test]
    fn storage_never_exceeds_capacity(spec in arb_line(), ticks in 0..600usize) {
        let (mut factory, store) = build_line(&spec);
        for _ in 0..ticks {
            factory.step();
            let total = factory.storage(store).unwrap().total();
            prop_assert!(total <= spec.capacity);
        }
    }

    #[test]
    fn lanes_keep_order_and_spacing(spec in arb_line(), ticks in 0..400usize) {
        let (mut factory, _) = build_line(&spec);
        let spacing = factory.config().min_item_spacing;
        for _ in 0..ticks {
            factory.step();
            for (_, seg) in factory.network().iter() {
                for lane in LaneId::ALL {
                    let items: Vec<_> = seg.lane(lane).items().collect();
                    for pair in items.windows(2) {
                        prop_assert!(pair[0].progress >= pair[1].progress + spacing);
                    }
                    for item in &items {
                        prop_assert!(item.progress <= Fixed64::ONE);
                        prop_assert!(item.progress >= Fixed64::ZERO);
                    }
                }
            }
            // A single miner feeds the line, so older items always lead.
            for ids in lane_ids(&factory) {
                prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn save_load_round_trip(spec in arb_line(), ticks in 0..300usize) {
        let (mut factory, _) = build_line(&spec);
        for _ in 0..ticks {
            factory.step();
        }
        let bytes = factory.serialize().unwrap();
        let loaded = Factory::deserialize(&bytes, factory.registries().clone()).unwrap();
        prop_assert_eq!(loaded.state_hash(), factory.state_hash());
        prop_assert_eq!(loaded.snapshot(), factory.snapshot());
    }

    #[test]
    fn snap_is_idempotent(
        x in -1000.0f32..1000.0,
        z in -1000.0f32..1000.0,
        cell in prop::sample::select(vec![0.5f32, 1.0, 2.0, 4.0]),
    ) {
        let grid = GridConfig { cell_size: cell };
        let once = grid.snap_world(WorldPos::new(x, z));
        prop_assert_eq!(grid.snap_world(once), once);
        prop_assert_eq!(grid.snap_to_grid(once), grid.snap_to_grid(WorldPos::new(x, z)));
    }
}
