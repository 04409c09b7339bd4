//! Reads the data directory and resolves it into [`Registries`], a
//! [`SimConfig`] and a [`SimulationStrategy`].
//!
//! A directory holds up to three files, each in RON, TOML or JSON:
//! `items` (required), `recipes` and `config`. Recipes name their items;
//! those names are resolved against the items file.

use crate::schema::{CategoryData, ConfigData, ItemData, RecipeData, StrategyData};
use beltline_core::fixed::{Fixed64, checked_seconds};
use beltline_core::grid::GridConfig;
use beltline_core::id::{ItemTypeId, RecipeId};
use beltline_core::registry::{ItemCategory, ItemDef, Recipe, Registries, RegistryError};
use beltline_core::sim::{SimConfig, SimulationStrategy};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{base}' not found in {dir}")]
    MissingRequired { base: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Same base name present in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {kind} '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("invalid value for '{field}' in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: String,
        detail: String,
    },

    #[error("{file}: {source}")]
    Registry {
        file: PathBuf,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats and discovery
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Format from the file extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// `dir/{base}.{ron,toml,json}` if exactly one exists. Two or more is an error.
pub fn find_data_file(dir: &Path, base: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut hits = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base}.{}", f.extension())))
        .filter(|p| p.is_file());
    let first = hits.next();
    if let (Some(a), Some(b)) = (&first, hits.next()) {
        return Err(DataLoadError::ConflictingFormats {
            a: a.clone(),
            b,
        });
    }
    Ok(first)
}

pub fn require_data_file(dir: &Path, base: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base)?.ok_or_else(|| DataLoadError::MissingRequired {
        base: base.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read and decode a whole file as `T`.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&text).map_err(|e| parse_error(path, e)),
    }
}

/// Read a list of entries. TOML has no top-level arrays, so there the list
/// lives under `toml_key` (`[[items]]` tables, for instance).
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let mut table: toml::Table = deserialize_file(path)?;
    let value = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}'")))?;
    value.try_into().map_err(|e| parse_error(path, e))
}

// ===========================================================================
// Name resolution
// ===========================================================================

pub fn resolve_name<V: Copy>(
    names: &HashMap<String, V>,
    name: &str,
    file: &Path,
    kind: &'static str,
) -> Result<V, DataLoadError> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.to_string(),
            kind,
        })
}

pub fn check_duplicate<V>(
    names: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if names.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Positive, finite seconds as `Fixed64`.
fn seconds(value: f64, field: &str, file: &Path) -> Result<Fixed64, DataLoadError> {
    let invalid = |detail: String| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        field: field.to_string(),
        detail,
    };
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(format!("expected a positive number, got {value}")));
    }
    checked_seconds(value)
        .filter(|v| *v > Fixed64::ZERO)
        .ok_or_else(|| invalid(format!("{value} is out of range")))
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything a data directory describes.
#[derive(Debug, Clone)]
pub struct FactoryData {
    pub registries: Registries,
    pub config: SimConfig,
    pub strategy: SimulationStrategy,
}

/// Load `items`, `recipes` and `config` from `dir`.
pub fn load_factory_data(dir: &Path) -> Result<FactoryData, DataLoadError> {
    let registries = load_registries(dir)?;
    let (config, strategy) = load_config(dir)?;
    Ok(FactoryData {
        registries,
        config,
        strategy,
    })
}

/// Build the item and recipe tables. `recipes` may be absent.
pub fn load_registries(dir: &Path) -> Result<Registries, DataLoadError> {
    let mut registries = Registries::new();

    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let mut item_ids: HashMap<String, ItemTypeId> = HashMap::new();
    for item in items {
        check_duplicate(&item_ids, &item.name, &items_path)?;
        let category = match item.category {
            CategoryData::Resource => ItemCategory::Resource,
            CategoryData::Intermediate => ItemCategory::Intermediate,
            CategoryData::Product => ItemCategory::Product,
        };
        let id = registries
            .add_item(ItemDef {
                name: item.name.clone(),
                category,
                stackable: item.stackable,
                max_stack: item.max_stack,
            })
            .map_err(|source| DataLoadError::Registry {
                file: items_path.clone(),
                source,
            })?;
        item_ids.insert(item.name, id);
    }

    let recipe_count = match find_data_file(dir, "recipes")? {
        Some(path) => load_recipes(&mut registries, &path, &item_ids)?,
        None => 0,
    };

    info!(
        dir = %dir.display(),
        items = item_ids.len(),
        recipes = recipe_count,
        "registries loaded"
    );
    Ok(registries)
}

/// Register every recipe in `path`, resolving item names. Returns the count.
fn load_recipes(
    registries: &mut Registries,
    path: &Path,
    item_ids: &HashMap<String, ItemTypeId>,
) -> Result<usize, DataLoadError> {
    let recipes: Vec<RecipeData> = deserialize_list(path, "recipes")?;
    let mut recipe_ids: HashMap<String, RecipeId> = HashMap::new();
    for data in recipes {
        check_duplicate(&recipe_ids, &data.name, path)?;
        let inputs = data
            .inputs
            .iter()
            .map(|name| resolve_name(item_ids, name, path, "item"))
            .collect::<Result<Vec<_>, _>>()?;
        let output = resolve_name(item_ids, &data.output, path, "item")?;
        let duration = seconds(data.duration, &format!("{}.duration", data.name), path)?;
        let input_count = if inputs.is_empty() { 0 } else { data.input_count };
        let recipe = Recipe {
            output_amount: data.output_amount,
            ..Recipe::new(inputs, input_count, output, duration)
        };
        let id = registries
            .add_recipe(&data.name, recipe)
            .map_err(|source| DataLoadError::Registry {
                file: path.to_path_buf(),
                source,
            })?;
        recipe_ids.insert(data.name, id);
    }
    Ok(recipe_ids.len())
}

/// Read `config` if present, otherwise the defaults with variable stepping.
pub fn load_config(dir: &Path) -> Result<(SimConfig, SimulationStrategy), DataLoadError> {
    let Some(path) = find_data_file(dir, "config")? else {
        debug!(dir = %dir.display(), "no config file, using defaults");
        return Ok((SimConfig::default(), SimulationStrategy::Variable));
    };
    let data: ConfigData = deserialize_file(&path)?;
    let mut config = SimConfig::default();

    if let Some(v) = data.tick_seconds {
        config.tick_seconds = seconds(v, "tick_seconds", &path)?;
    }
    if let Some(v) = data.segment_length {
        config.segment_length = seconds(v, "segment_length", &path)?;
    }
    if let Some(v) = data.min_item_spacing {
        let spacing = seconds(v, "min_item_spacing", &path)?;
        if spacing > Fixed64::ONE {
            return Err(DataLoadError::InvalidValue {
                file: path,
                field: "min_item_spacing".to_string(),
                detail: format!("must be at most 1, got {v}"),
            });
        }
        config.min_item_spacing = spacing;
    }
    if let Some(cell_size) = data.cell_size {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(DataLoadError::InvalidValue {
                file: path,
                field: "cell_size".to_string(),
                detail: format!("expected a positive number, got {cell_size}"),
            });
        }
        config.grid = GridConfig { cell_size };
    }
    if let Some(v) = data.input_buffer_cycles {
        config.input_buffer_cycles = v;
    }
    if let Some(v) = data.event_capacity {
        config.event_capacity = v;
    }
    let strategy = match data.strategy {
        None | Some(StrategyData::Variable) => SimulationStrategy::Variable,
        Some(StrategyData::Fixed { timestep }) => SimulationStrategy::Fixed {
            timestep: seconds(timestep, "strategy.timestep", &path)?,
        },
    };

    info!(file = %path.display(), ?strategy, "config loaded");
    Ok((config, strategy))
}

// ===========================================================================
// Tests
// ===========================================================================
