//! Production units: miners and machines.
//!
//! Both run the same timer-driven state machine over a [`Recipe`]. A miner is
//! a unit whose recipe has no inputs, so it never starves.

use crate::error::{Rejected, SimError};
use crate::fixed::Fixed64;
use crate::grid::{Direction, GridPosition};
use crate::id::{ItemTypeId, RecipeId, TransitItemId, TransitItemIdGen};
use crate::item::TransitItem;
use crate::registry::Recipe;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Miner,
    Machine,
}

/// Where a unit is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    /// Not yet started, or waiting on inputs with a full timer.
    #[default]
    Idle,
    /// Timer running.
    Producing,
    /// Output slot occupied; the timer is frozen until it is taken.
    BufferFull,
}

/// What one call to [`ProductionUnit::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The unit is switched off.
    Inactive,
    /// Output slot still occupied.
    Blocked,
    /// Timer advanced, cycle not finished.
    Progressing,
    /// Timer is full but inputs are missing. `first` is set on the tick the
    /// unit starts waiting.
    Starved { first: bool },
    /// A cycle finished. The new item now sits in the output slot.
    Completed {
        item: TransitItemId,
        item_type: ItemTypeId,
        amount: u32,
        consumed: Vec<(ItemTypeId, u32)>,
    },
}

// ---------------------------------------------------------------------------
// ProductionUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionUnit {
    pub position: GridPosition,
    /// Produced items leave through the cell in this direction.
    pub facing: Direction,
    pub active: bool,
    /// Registry entry the recipe came from. Miners run an anonymous generator.
    recipe_id: Option<RecipeId>,
    recipe: Recipe,
    state: UnitState,
    timer: Fixed64,
    starved: bool,
    inputs: BTreeMap<ItemTypeId, VecDeque<TransitItem>>,
    input_capacity: u32,
    output: Option<TransitItem>,
}

impl ProductionUnit {
    /// A miner emitting `resource` at `rate` items per second.
    pub fn miner(
        position: GridPosition,
        facing: Direction,
        resource: ItemTypeId,
        rate: Fixed64,
    ) -> Result<Self, SimError> {
        let recipe = Recipe::generator(resource, rate)?;
        Ok(Self::with_recipe(position, facing, None, recipe, 0))
    }

    /// A machine running a registered recipe. Each input buffer holds
    /// `buffer_cycles` cycles' worth of that input.
    pub fn machine(
        position: GridPosition,
        facing: Direction,
        recipe_id: RecipeId,
        recipe: Recipe,
        buffer_cycles: u32,
    ) -> Self {
        let capacity = recipe.input_count.saturating_mul(buffer_cycles.max(1));
        Self::with_recipe(position, facing, Some(recipe_id), recipe, capacity)
    }

    fn with_recipe(
        position: GridPosition,
        facing: Direction,
        recipe_id: Option<RecipeId>,
        recipe: Recipe,
        input_capacity: u32,
    ) -> Self {
        let inputs = recipe
            .inputs
            .iter()
            .map(|&ty| (ty, VecDeque::new()))
            .collect();
        Self {
            position,
            facing,
            active: true,
            recipe_id,
            recipe,
            state: UnitState::Idle,
            timer: Fixed64::ZERO,
            starved: false,
            inputs,
            input_capacity,
            output: None,
        }
    }

    pub fn kind(&self) -> UnitKind {
        if self.recipe.is_generator() {
            UnitKind::Miner
        } else {
            UnitKind::Machine
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn recipe_id(&self) -> Option<RecipeId> {
        self.recipe_id
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn timer(&self) -> Fixed64 {
        self.timer
    }

    /// Whether the unit is waiting on inputs with a full timer.
    pub fn is_starved(&self) -> bool {
        self.starved
    }

    pub fn output(&self) -> Option<&TransitItem> {
        self.output.as_ref()
    }

    pub fn input_capacity(&self) -> u32 {
        self.input_capacity
    }

    /// Buffered items of one input type.
    pub fn input_count(&self, item_type: ItemTypeId) -> u32 {
        self.inputs.get(&item_type).map_or(0, |q| q.len() as u32)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (ItemTypeId, &VecDeque<TransitItem>)> {
        self.inputs.iter().map(|(&ty, q)| (ty, q))
    }

    /// The cell produced items are delivered into.
    pub fn output_cell(&self) -> GridPosition {
        self.position.step(self.facing)
    }

    /// Advance the cycle timer by `dt`.
    pub fn tick(&mut self, dt: Fixed64, ids: &mut TransitItemIdGen) -> CycleOutcome {
        if !self.active {
            return CycleOutcome::Inactive;
        }
        if self.output.is_some() {
            self.state = UnitState::BufferFull;
            return CycleOutcome::Blocked;
        }

        let duration = self.recipe.duration;
        self.timer = self.timer.saturating_add(dt);
        if self.timer < duration {
            self.state = UnitState::Producing;
            return CycleOutcome::Progressing;
        }

        if !self.inputs_ready() {
            let first = !self.starved;
            self.starved = true;
            self.timer = duration;
            self.state = UnitState::Idle;
            return CycleOutcome::Starved { first };
        }

        self.starved = false;
        let consumed = self.consume_inputs();
        let item = TransitItem::new(ids.allocate(), self.recipe.output, self.recipe.output_amount);
        let outcome = CycleOutcome::Completed {
            item: item.id,
            item_type: item.item_type,
            amount: item.amount,
            consumed,
        };
        self.output = Some(item);
        self.state = UnitState::BufferFull;
        // Keep the overrun for steady throughput, but never bank a second cycle.
        self.timer = (self.timer - duration).min(duration);
        outcome
    }

    /// Pull the finished item out of the output slot.
    pub fn take_item(&mut self) -> Option<TransitItem> {
        let item = self.output.take()?;
        self.state = UnitState::Producing;
        Some(item)
    }

    /// Put an item back into an empty output slot after a failed delivery.
    pub(crate) fn restore_output(&mut self, item: TransitItem) {
        debug_assert!(self.output.is_none());
        self.output = Some(item);
        self.state = UnitState::BufferFull;
    }

    /// Whether an item of `item_type` would be accepted into the inputs.
    pub fn can_accept(&self, item_type: ItemTypeId) -> bool {
        self.inputs
            .get(&item_type)
            .is_some_and(|q| (q.len() as u32) < self.input_capacity)
    }

    /// Hand an item into the matching input buffer.
    pub fn accept_input(&mut self, item: TransitItem) -> Result<(), Rejected> {
        let capacity = self.input_capacity;
        let Some(queue) = self.inputs.get_mut(&item.item_type) else {
            return Err(Rejected {
                reason: SimError::InvalidParameter(format!(
                    "recipe does not take item type {}",
                    item.item_type.0
                )),
                item,
            });
        };
        let stored = queue.len() as u32;
        if stored >= capacity {
            return Err(Rejected {
                reason: SimError::CapacityExceeded {
                    stored,
                    incoming: 1,
                    capacity,
                },
                item,
            });
        }
        queue.push_back(item);
        Ok(())
    }

    /// Take every buffered item off the unit, inputs first.
    pub(crate) fn drain_items(&mut self) -> Vec<TransitItem> {
        let mut items: Vec<TransitItem> = self
            .inputs
            .values_mut()
            .flat_map(|q| q.drain(..))
            .collect();
        items.extend(self.output.take());
        items
    }

    fn inputs_ready(&self) -> bool {
        let need = self.recipe.input_count as usize;
        self.inputs.values().all(|q| q.len() >= need)
    }

    fn consume_inputs(&mut self) -> Vec<(ItemTypeId, u32)> {
        let need = self.recipe.input_count as usize;
        self.inputs
            .iter_mut()
            .map(|(&ty, q)| {
                let units = q.drain(..need).map(|item| item.amount).sum();
                (ty, units)
            })
            .collect()
    }
}
