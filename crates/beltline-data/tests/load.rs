//! Whole-directory loads, mixing formats, then running the result.

use beltline_core::factory::Factory;
use beltline_core::fixed::Fixed64;
use beltline_core::grid::{Direction, GridPosition};
use beltline_core::registry::ItemCategory;
use beltline_core::sim::SimulationStrategy;
use beltline_data::{DataLoadError, load_factory_data, load_registries};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("beltline_data_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

const ITEMS_RON: &str = r#"[
    (name: "iron_ore"),
    (name: "iron_plate", category: intermediate),
    (name: "gear", category: product, stackable: false, max_stack: 1),
]"#;

const RECIPES_JSON: &str = r#"[
    {"name": "smelt", "inputs": ["iron_ore"], "input_count": 2, "output": "iron_plate", "duration": 2.0},
    {"name": "press", "inputs": ["iron_plate"], "output": "gear", "duration": 0.5}
]"#;

const CONFIG_TOML: &str = r#"
tick_seconds = 0.125
min_item_spacing = 0.5
input_buffer_cycles = 3

[strategy.fixed]
timestep = 0.125
"#;

fn write_full_fixture(dir: &Path) {
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("recipes.json"), RECIPES_JSON).unwrap();
    fs::write(dir.join("config.toml"), CONFIG_TOML).unwrap();
}

#[test]
fn loads_mixed_formats() {
    let dir = fixture_dir("mixed");
    write_full_fixture(&dir);

    let data = load_factory_data(&dir).unwrap();
    let items = &data.registries.items;
    assert_eq!(items.len(), 3);
    let ore = items.id_of("iron_ore").unwrap();
    let plate = items.id_of("iron_plate").unwrap();
    let gear = items.lookup(items.id_of("gear").unwrap()).unwrap();
    assert_eq!(gear.category, ItemCategory::Product);
    assert!(!gear.stackable);

    let smelt = data
        .registries
        .recipes
        .lookup(data.registries.recipes.id_of("smelt").unwrap())
        .unwrap();
    assert_eq!(smelt.recipe.inputs, vec![ore]);
    assert_eq!(smelt.recipe.input_count, 2);
    assert_eq!(smelt.recipe.output, plate);
    assert_eq!(smelt.recipe.duration, Fixed64::from_num(2));

    assert_eq!(data.config.tick_seconds, Fixed64::from_num(0.125));
    assert_eq!(data.config.min_item_spacing, Fixed64::from_num(0.5));
    assert_eq!(data.config.input_buffer_cycles, 3);
    assert_eq!(
        data.strategy,
        SimulationStrategy::Fixed {
            timestep: Fixed64::from_num(0.125)
        }
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn loaded_data_drives_a_factory() {
    let dir = fixture_dir("drive");
    write_full_fixture(&dir);
    let data = load_factory_data(&dir).unwrap();
    let ore = data.registries.items.id_of("iron_ore").unwrap();
    let smelt = data.registries.recipes.id_of("smelt").unwrap();

    let mut factory =
        Factory::new(data.registries.into_shared(), data.config, data.strategy).unwrap();
    factory
        .place_miner(GridPosition::new(0, 0), Direction::East, ore, Fixed64::ONE)
        .unwrap();
    factory
        .place_conveyor(GridPosition::new(1, 0), Direction::East, Fixed64::ONE)
        .unwrap();
    let smelter = factory
        .place_machine(GridPosition::new(2, 0), Direction::East, smelt)
        .unwrap();
    assert_eq!(factory.unit(smelter).unwrap().input_capacity(), 6);

    let result = factory.advance(Fixed64::from_num(10));
    assert_eq!(result.ticks_run, 80);
    assert!(factory.stats().produced > 0);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn toml_items_and_ron_recipes() {
    let dir = fixture_dir("toml_items");
    fs::write(
        dir.join("items.toml"),
        "[[items]]\nname = \"sand\"\n\n[[items]]\nname = \"glass\"\ncategory = \"product\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("recipes.ron"),
        r#"[(name: "melt", inputs: ["sand"], output: "glass", output_amount: 2, duration: 1.5)]"#,
    )
    .unwrap();

    let registries = load_registries(&dir).unwrap();
    let melt = registries
        .recipes
        .lookup(registries.recipes.id_of("melt").unwrap())
        .unwrap();
    assert_eq!(melt.recipe.output_amount, 2);
    assert_eq!(melt.recipe.duration, Fixed64::from_num(1.5));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn recipes_file_is_optional() {
    let dir = fixture_dir("no_recipes");
    fs::write(dir.join("items.json"), r#"[{"name": "ore"}]"#).unwrap();
    let data = load_factory_data(&dir).unwrap();
    assert_eq!(data.registries.items.len(), 1);
    assert!(data.registries.recipes.is_empty());
    assert_eq!(data.strategy, SimulationStrategy::Variable);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn items_file_is_required() {
    let dir = fixture_dir("no_items");
    let err = load_factory_data(&dir).unwrap_err();
    assert!(matches!(err, DataLoadError::MissingRequired { .. }));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_item_in_recipe() {
    let dir = fixture_dir("unresolved");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(
        dir.join("recipes.json"),
        r#"[{"name": "alchemy", "inputs": ["lead"], "output": "gear", "duration": 1.0}]"#,
    )
    .unwrap();
    match load_registries(&dir).unwrap_err() {
        DataLoadError::UnresolvedRef { name, file, .. } => {
            assert_eq!(name, "lead");
            assert_eq!(file, dir.join("recipes.json"));
        }
        other => panic!("expected UnresolvedRef, got {other:?}"),
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_item_names() {
    let dir = fixture_dir("dup_items");
    fs::write(dir.join("items.ron"), r#"[(name: "ore"), (name: "ore")]"#).unwrap();
    assert!(matches!(
        load_registries(&dir),
        Err(DataLoadError::DuplicateName { .. })
    ));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_recipe_is_a_registry_error() {
    let dir = fixture_dir("bad_recipe");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(
        dir.join("recipes.json"),
        r#"[{"name": "twice", "inputs": ["iron_ore", "iron_ore"], "output": "gear", "duration": 1.0}]"#,
    )
    .unwrap();
    assert!(matches!(
        load_registries(&dir),
        Err(DataLoadError::Registry { .. })
    ));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unit_output_cannot_stack() {
    let dir = fixture_dir("unit_stack");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(
        dir.join("recipes.json"),
        r#"[{"name": "press", "inputs": ["iron_plate"], "output": "gear", "output_amount": 3, "duration": 1.0}]"#,
    )
    .unwrap();
    let err = load_registries(&dir).unwrap_err();
    assert!(matches!(err, DataLoadError::Registry { .. }));
    assert!(err.to_string().contains("recipes.json"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn zero_duration_is_rejected() {
    let dir = fixture_dir("zero_duration");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(
        dir.join("recipes.json"),
        r#"[{"name": "instant", "inputs": ["iron_ore"], "output": "gear", "duration": 0.0}]"#,
    )
    .unwrap();
    let err = load_registries(&dir).unwrap_err();
    assert!(err.to_string().contains("instant.duration"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn out_of_range_spacing() {
    let dir = fixture_dir("spacing");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("config.toml"), "min_item_spacing = 1.5\n").unwrap();
    assert!(matches!(
        load_factory_data(&dir),
        Err(DataLoadError::InvalidValue { .. })
    ));
    let _ = fs::remove_dir_all(&dir);
}
