//! On-disk shapes for item, recipe and configuration files.
//!
//! Everything here refers to other definitions by name and uses plain
//! floats. The loader turns these into registry ids and `Fixed64` values.

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// One entry of the `items` file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub category: CategoryData,
    #[serde(default = "default_true")]
    pub stackable: bool,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryData {
    #[default]
    Resource,
    Intermediate,
    Product,
}

fn default_true() -> bool {
    true
}

fn default_max_stack() -> u32 {
    100
}

// ===========================================================================
// Recipes
// ===========================================================================

/// One entry of the `recipes` file. `input_count` applies to every input.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default = "default_one")]
    pub input_count: u32,
    pub output: String,
    #[serde(default = "default_one")]
    pub output_amount: u32,
    /// Cycle length in seconds.
    pub duration: f64,
}

fn default_one() -> u32 {
    1
}

// ===========================================================================
// Configuration
// ===========================================================================

/// The optional `config` file. Missing fields keep their built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigData {
    pub tick_seconds: Option<f64>,
    pub cell_size: Option<f32>,
    pub segment_length: Option<f64>,
    pub min_item_spacing: Option<f64>,
    pub input_buffer_cycles: Option<u32>,
    pub event_capacity: Option<usize>,
    pub strategy: Option<StrategyData>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyData {
    Variable,
    Fixed { timestep: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_defaults_fill_in() {
        let item: ItemData = ron::from_str(r#"(name: "ore")"#).unwrap();
        assert_eq!(item.category, CategoryData::Resource);
        assert!(item.stackable);
        assert_eq!(item.max_stack, 100);
    }

    #[test]
    fn generator_recipe_needs_no_inputs() {
        let recipe: RecipeData =
            serde_json::from_str(r#"{"name": "dig", "output": "ore", "duration": 0.5}"#).unwrap();
        assert!(recipe.inputs.is_empty());
        assert_eq!(recipe.output_amount, 1);
    }

    #[test]
    fn strategy_parses_from_toml() {
        let config: ConfigData = toml::from_str(
            r#"
            tick_seconds = 0.125
            [strategy.fixed]
            timestep = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.tick_seconds, Some(0.125));
        assert_eq!(config.strategy, Some(StrategyData::Fixed { timestep: 0.25 }));
        assert!(config.cell_size.is_none());
    }
}
