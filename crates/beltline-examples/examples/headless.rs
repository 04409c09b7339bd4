//! Headless run: load the bundled data files, lay out a smelting line,
//! run a minute of simulated time and print what happened.
//!
//! Layout (east is right):
//!
//! ```text
//! miner > belt > belt > belt > smelter > belt > box
//! ```
//!
//! Run with: `RUST_LOG=debug cargo run -p beltline-examples --example headless`

use beltline_core::event::EventKind;
use beltline_core::factory::Factory;
use beltline_core::fixed::{Fixed64, to_seconds};
use beltline_core::grid::{Direction, GridPosition};
use beltline_core::id::ItemTypeId;
use beltline_core::registry::Registries;
use beltline_data::load_factory_data;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    let data = load_factory_data(&data_dir)?;
    let ore = data.registries.items.id_of("iron_ore")?;
    let smelt = data.registries.recipes.id_of("smelt_iron")?;
    let mut factory = Factory::new(data.registries.into_shared(), data.config, data.strategy)?;

    // --- Build the line ---

    let east = Direction::East;
    factory.place_miner(GridPosition::new(0, 0), east, ore, Fixed64::ONE)?;
    for x in 1..=3 {
        factory.place_conveyor(GridPosition::new(x, 0), east, Fixed64::ONE)?;
    }
    let smelter = factory.place_machine(GridPosition::new(4, 0), east, smelt)?;
    factory.place_conveyor(GridPosition::new(5, 0), east, Fixed64::ONE)?;
    let output_box = factory.place_storage(GridPosition::new(6, 0), east, 50)?;

    // --- Run for 60 simulated seconds in one-second frames ---

    for second in 1..=60 {
        factory.advance(Fixed64::ONE);
        if second % 15 == 0 {
            let Some(unit) = factory.snapshot_unit(smelter) else {
                break;
            };
            println!(
                "t={second:>2}s  smelter {:?} {:>3.0}%  belts carry {} item(s)",
                unit.state,
                unit.progress.to_num::<f64>() * 100.0,
                factory.items_on_belts().len(),
            );
        }
    }

    // --- Report ---

    let registries = factory.registries().clone();
    let snapshot = factory.snapshot();
    println!();
    println!(
        "after {} ticks ({:.2}s):",
        snapshot.tick,
        to_seconds(snapshot.elapsed)
    );
    let stats = &snapshot.stats;
    println!(
        "  produced {}  consumed {}  stored {}  in flight {}",
        stats.produced,
        stats.consumed,
        stats.stored,
        factory.units_in_flight()
    );

    if let Some(stored) = factory.snapshot_storage(output_box) {
        let total: u32 = stored.contents.iter().map(|(_, n)| n).sum();
        println!("  output box ({total} / {}):", stored.capacity);
        for (item_type, amount) in &stored.contents {
            println!("    {:<12} {amount}", item_name(&registries, *item_type));
        }
    }

    let events = factory.events();
    println!(
        "  events: {} produced, {} consumed, {} stored, {} starved",
        events.count(EventKind::ItemProduced),
        events.count(EventKind::ItemsConsumed),
        events.count(EventKind::ItemStored),
        events.count(EventKind::UnitStarved),
    );
    println!("  state hash {:016x}", factory.state_hash());
    Ok(())
}

fn item_name(registries: &Registries, id: ItemTypeId) -> &str {
    registries
        .items
        .lookup(id)
        .map(|def| def.name.as_str())
        .unwrap_or("?")
}
