//! Item and recipe definition tables.
//!
//! String names are interned into [`ItemTypeId`] / [`RecipeId`] on
//! registration; the simulation only ever sees the ids. Ids are positional and
//! never reused, so removing an entry leaves a tombstone and every other id
//! stays valid.
//!
//! Tools mutate a [`Registries`] value, then freeze it with
//! [`Registries::into_shared`] and hand the `Arc` to the simulation, which only
//! reads it.

use crate::fixed::{Fixed64, period};
use crate::id::{ItemTypeId, RecipeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NameNotFound(String),
    #[error("item {0:?} not found")]
    ItemNotFound(ItemTypeId),
    #[error("recipe {0:?} not found")]
    RecipeNotFound(RecipeId),
    #[error("duplicate name: {0}")]
    Duplicate(String),
    #[error("invalid recipe '{name}': {reason}")]
    InvalidRecipe { name: String, reason: String },
    #[error("item '{item}' is still used by recipe '{recipe}'")]
    InUse { item: String, recipe: String },
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Broad grouping of item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    /// Raw material pulled out of the ground by miners.
    Resource,
    Intermediate,
    Product,
}

/// Static definition of an item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub name: String,
    pub category: ItemCategory,
    /// Stackable items merge into a storage ledger as amounts.
    pub stackable: bool,
    /// Largest amount a single transit item may carry. Unit items carry 1.
    pub max_stack: u32,
}

impl ItemDef {
    /// A stackable item with the default stack size.
    pub fn new(name: &str, category: ItemCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            stackable: true,
            max_stack: 100,
        }
    }

    /// A unit item that never stacks.
    pub fn unit(name: &str, category: ItemCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            stackable: false,
            max_stack: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: Vec<Option<ItemDef>>,
    name_to_id: HashMap<String, ItemTypeId>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Returns its id.
    pub fn register(&mut self, def: ItemDef) -> Result<ItemTypeId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::Duplicate(def.name));
        }
        let id = ItemTypeId(self.items.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.items.push(Some(def));
        Ok(id)
    }

    pub fn lookup(&self, id: ItemTypeId) -> Result<&ItemDef, RegistryError> {
        self.items
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(RegistryError::ItemNotFound(id))
    }

    pub fn id_of(&self, name: &str) -> Result<ItemTypeId, RegistryError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, id: ItemTypeId) -> bool {
        self.lookup(id).is_ok()
    }

    fn remove(&mut self, id: ItemTypeId) -> Result<ItemDef, RegistryError> {
        let def = self
            .items
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(RegistryError::ItemNotFound(id))?;
        self.name_to_id.remove(&def.name);
        Ok(def)
    }

    /// Drop every definition. Ids handed out earlier stay retired.
    pub fn clear(&mut self) {
        for slot in &mut self.items {
            *slot = None;
        }
        self.name_to_id.clear();
    }

    /// Number of live item definitions.
    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, &ItemDef)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, def)| def.as_ref().map(|d| (ItemTypeId(i as u32), d)))
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// A production rule: `input_count` of every input type become
/// `output_amount` of `output` after `duration` seconds.
///
/// A recipe with no inputs is a generator, which is what a miner runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub inputs: Vec<ItemTypeId>,
    /// Required count, uniform across every input type.
    pub input_count: u32,
    pub output: ItemTypeId,
    pub output_amount: u32,
    /// Cycle length in seconds.
    pub duration: Fixed64,
}

impl Recipe {
    pub fn new(inputs: Vec<ItemTypeId>, input_count: u32, output: ItemTypeId, duration: Fixed64) -> Self {
        Self {
            inputs,
            input_count,
            output,
            output_amount: 1,
            duration,
        }
    }

    /// A zero-input rule emitting one `output` every `1 / rate` seconds.
    pub fn generator(output: ItemTypeId, rate: Fixed64) -> Result<Self, RegistryError> {
        let duration = period(rate).ok_or_else(|| RegistryError::InvalidRecipe {
            name: format!("generator:{}", output.0),
            reason: format!("rate must be positive, got {rate}"),
        })?;
        Ok(Self::new(Vec::new(), 0, output, duration))
    }

    pub fn is_generator(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Structural checks that do not need the item table.
    pub fn validate(&self, name: &str) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidRecipe {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if self.duration <= Fixed64::ZERO {
            return Err(invalid("duration must be positive"));
        }
        if self.output_amount == 0 {
            return Err(invalid("output amount must be positive"));
        }
        if !self.inputs.is_empty() && self.input_count == 0 {
            return Err(invalid("input count must be positive"));
        }
        let mut seen = self.inputs.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.inputs.len() {
            return Err(invalid("input types must be unique"));
        }
        Ok(())
    }
}

/// A named recipe in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDef {
    pub name: String,
    pub recipe: Recipe,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeRegistry {
    recipes: Vec<Option<RecipeDef>>,
    name_to_id: HashMap<String, RecipeId>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipe whose item references have already been checked.
    fn register(&mut self, name: &str, recipe: Recipe) -> Result<RecipeId, RegistryError> {
        if self.name_to_id.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        recipe.validate(name)?;
        let id = RecipeId(self.recipes.len() as u32);
        self.name_to_id.insert(name.to_string(), id);
        self.recipes.push(Some(RecipeDef {
            name: name.to_string(),
            recipe,
        }));
        Ok(id)
    }

    pub fn lookup(&self, id: RecipeId) -> Result<&RecipeDef, RegistryError> {
        self.recipes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(RegistryError::RecipeNotFound(id))
    }

    pub fn id_of(&self, name: &str) -> Result<RecipeId, RegistryError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }

    fn remove(&mut self, id: RecipeId) -> Result<RecipeDef, RegistryError> {
        let def = self
            .recipes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(RegistryError::RecipeNotFound(id))?;
        self.name_to_id.remove(&def.name);
        Ok(def)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.recipes {
            *slot = None;
        }
        self.name_to_id.clear();
    }

    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipeId, &RecipeDef)> {
        self.recipes
            .iter()
            .enumerate()
            .filter_map(|(i, def)| def.as_ref().map(|d| (RecipeId(i as u32), d)))
    }
}

// ---------------------------------------------------------------------------
// Combined registries
// ---------------------------------------------------------------------------

/// Both definition tables, kept consistent with each other.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub items: ItemRegistry,
    pub recipes: RecipeRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, def: ItemDef) -> Result<ItemTypeId, RegistryError> {
        self.items.register(def)
    }

    /// Register a recipe. Every referenced item must already exist, and one
    /// cycle's output has to fit in a single stack of the output item.
    pub fn add_recipe(&mut self, name: &str, recipe: Recipe) -> Result<RecipeId, RegistryError> {
        for &item in &recipe.inputs {
            self.items.lookup(item)?;
        }
        let output = self.items.lookup(recipe.output)?;
        let stack = if output.stackable { output.max_stack } else { 1 };
        if recipe.output_amount > stack {
            return Err(RegistryError::InvalidRecipe {
                name: name.to_string(),
                reason: format!(
                    "output_amount {} exceeds the stack size {} of '{}'",
                    recipe.output_amount, stack, output.name
                ),
            });
        }
        self.recipes.register(name, recipe)
    }

    /// Remove an item type. Fails while any recipe still references it.
    pub fn remove_item(&mut self, id: ItemTypeId) -> Result<ItemDef, RegistryError> {
        let name = self.items.lookup(id)?.name.clone();
        if let Some((_, def)) = self
            .recipes
            .iter()
            .find(|(_, def)| def.recipe.output == id || def.recipe.inputs.contains(&id))
        {
            return Err(RegistryError::InUse {
                item: name,
                recipe: def.name.clone(),
            });
        }
        self.items.remove(id)
    }

    pub fn remove_recipe(&mut self, id: RecipeId) -> Result<RecipeDef, RegistryError> {
        self.recipes.remove(id)
    }

    /// Remove every item and recipe.
    pub fn clear(&mut self) {
        self.recipes.clear();
        self.items.clear();
    }

    /// Freeze into the read-only handle the simulation holds.
    pub fn into_shared(self) -> Arc<Registries> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Registries, ItemTypeId, ItemTypeId, RecipeId) {
        let mut reg = Registries::new();
        let ore = reg
            .add_item(ItemDef::new("iron_ore", ItemCategory::Resource))
            .unwrap();
        let plate = reg
            .add_item(ItemDef::new("iron_plate", ItemCategory::Intermediate))
            .unwrap();
        let smelt = reg
            .add_recipe("smelt_iron", Recipe::new(vec![ore], 2, plate, Fixed64::from_num(2)))
            .unwrap();
        (reg, ore, plate, smelt)
    }

    #[test]
    fn register_and_lookup() {
        let (reg, ore, _, smelt) = setup();
        assert_eq!(reg.items.len(), 2);
        assert_eq!(reg.recipes.len(), 1);
        assert_eq!(reg.items.lookup(ore).unwrap().name, "iron_ore");
        assert_eq!(reg.recipes.lookup(smelt).unwrap().recipe.input_count, 2);
        assert_eq!(reg.items.id_of("iron_ore").unwrap(), ore);
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let (reg, _, _, _) = setup();
        assert_eq!(
            reg.items.lookup(ItemTypeId(99)),
            Err(RegistryError::ItemNotFound(ItemTypeId(99)))
        );
        assert!(matches!(
            reg.recipes.id_of("nope"),
            Err(RegistryError::NameNotFound(_))
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut reg, _, _, _) = setup();
        let err = reg
            .add_item(ItemDef::new("iron_ore", ItemCategory::Resource))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("iron_ore".into()));
    }

    #[test]
    fn recipe_with_unknown_item_rejected() {
        let (mut reg, ore, _, _) = setup();
        let err = reg
            .add_recipe("bad", Recipe::new(vec![ore], 1, ItemTypeId(42), Fixed64::ONE))
            .unwrap_err();
        assert_eq!(err, RegistryError::ItemNotFound(ItemTypeId(42)));
    }

    #[test]
    fn recipe_structure_validated() {
        let (mut reg, ore, plate, _) = setup();
        let zero_duration = Recipe::new(vec![ore], 1, plate, Fixed64::ZERO);
        assert!(matches!(
            reg.add_recipe("zero", zero_duration),
            Err(RegistryError::InvalidRecipe { .. })
        ));
        let repeated = Recipe::new(vec![ore, ore], 1, plate, Fixed64::ONE);
        assert!(matches!(
            reg.add_recipe("repeated", repeated),
            Err(RegistryError::InvalidRecipe { .. })
        ));
    }

    #[test]
    fn removing_used_item_fails() {
        let (mut reg, ore, _, smelt) = setup();
        assert!(matches!(reg.remove_item(ore), Err(RegistryError::InUse { .. })));
        reg.remove_recipe(smelt).unwrap();
        reg.remove_item(ore).unwrap();
        assert!(reg.items.lookup(ore).is_err());
    }

    #[test]
    fn ids_not_reused_after_removal() {
        let (mut reg, _, _, smelt) = setup();
        reg.remove_recipe(smelt).unwrap();
        let ore = reg.items.id_of("iron_ore").unwrap();
        reg.remove_item(ore).unwrap();
        let copper = reg
            .add_item(ItemDef::new("copper_ore", ItemCategory::Resource))
            .unwrap();
        assert_ne!(copper, ore);
    }

    #[test]
    fn clear_empties_both_tables() {
        let (mut reg, ore, _, _) = setup();
        reg.clear();
        assert!(reg.items.is_empty());
        assert!(reg.recipes.is_empty());
        assert!(!reg.items.contains(ore));
    }

    #[test]
    fn output_must_fit_one_stack() {
        let (mut reg, _, plate, _) = setup();
        let gear = reg
            .add_item(ItemDef::unit("gear", ItemCategory::Product))
            .unwrap();
        let mut press = Recipe::new(vec![plate], 1, gear, Fixed64::ONE);
        press.output_amount = 2;
        let err = reg.add_recipe("press_gear", press.clone()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRecipe { ref name, .. } if name == "press_gear"));
        assert!(reg.recipes.id_of("press_gear").is_err());

        press.output_amount = 1;
        assert!(reg.add_recipe("press_gear", press).is_ok());

        let mut cast = Recipe::new(vec![plate], 1, plate, Fixed64::ONE);
        cast.output_amount = 101;
        assert!(reg.add_recipe("cast", cast).is_err());
    }

    #[test]
    fn generator_duration_from_rate() {
        let gen_rule = Recipe::generator(ItemTypeId(0), Fixed64::from_num(2)).unwrap();
        assert!(gen_rule.is_generator());
        assert_eq!(gen_rule.duration, Fixed64::from_num(0.5));
        assert!(Recipe::generator(ItemTypeId(0), Fixed64::ZERO).is_err());
    }
}
