//! Data-file loading for beltline: item and recipe definitions plus
//! simulation configuration, in RON, TOML or JSON.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, FactoryData, load_config, load_factory_data, load_registries};
