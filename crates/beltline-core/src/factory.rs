//! The simulation root: owns the grid and every entity, and runs the tick
//! pipeline.
//!
//! # Pipeline
//!
//! Each tick runs, in this order:
//! 1. **Pre-tick**: apply queued [`Command`]s.
//! 2. **Production**: every unit advances its cycle timer.
//! 3. **Conveyors**: every active segment advances its lanes.
//! 4. **Hand-offs**: belt fronts, then unit outputs, then storage dispensers
//!    move items to whatever sits at their output cell.
//! 5. **Bookkeeping**: tick counter, elapsed time, state hash.
//!
//! An item produced in phase 2 is delivered in phase 4 at progress 0, so it is
//! never advanced during the tick it was made in.

use crate::command_queue::{Command, CommandQueue};
use crate::conveyor::{ConveyorNetwork, ConveyorSegment};
use crate::error::SimError;
use crate::event::{Event, EventLog};
use crate::fixed::{Fixed64, Ticks};
use crate::grid::{Direction, GridIndex, GridPosition};
use crate::id::{EntityRef, ItemTypeId, RecipeId, SegmentId, StorageId, TransitItemIdGen, UnitId};
use crate::item::TransitItem;
use crate::production::{CycleOutcome, ProductionUnit};
use crate::registry::Registries;
use crate::sim::{AdvanceResult, SimConfig, SimState, SimulationStrategy, StateHash};
use crate::storage::StorageBox;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running unit counters. Every unit ever produced is accounted for by
/// `in_flight + in_storage + consumed + withdrawn + discarded`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryStats {
    /// Units created by completed cycles.
    pub produced: u64,
    /// Units eaten by machine recipes.
    pub consumed: u64,
    /// Units absorbed into storage ledgers.
    pub stored: u64,
    /// Units taken out of the factory by the caller.
    pub withdrawn: u64,
    /// Units re-emitted from storage as fresh items.
    pub dispensed: u64,
    /// Units dropped by entity removal.
    pub discarded: u64,
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct Factory {
    pub(crate) registries: Arc<Registries>,
    pub(crate) config: SimConfig,
    pub(crate) strategy: SimulationStrategy,
    pub(crate) sim_state: SimState,
    pub(crate) paused: bool,
    pub(crate) grid: GridIndex,
    pub(crate) network: ConveyorNetwork,
    pub(crate) units: SlotMap<UnitId, ProductionUnit>,
    pub(crate) storages: SlotMap<StorageId, StorageBox>,
    pub(crate) item_ids: TransitItemIdGen,
    pub(crate) stats: FactoryStats,
    pub(crate) commands: CommandQueue,
    pub(crate) events: EventLog,
    pub(crate) last_state_hash: u64,
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("tick", &self.sim_state.tick)
            .field("segments", &self.network.len())
            .field("units", &self.units.len())
            .field("storages", &self.storages.len())
            .field("paused", &self.paused)
            .finish()
    }
}

impl Factory {
    /// An empty factory. Fails if the config or strategy holds a
    /// non-positive time step, length or spacing.
    pub fn new(
        registries: Arc<Registries>,
        config: SimConfig,
        strategy: SimulationStrategy,
    ) -> Result<Self, SimError> {
        validate_config(&config, &strategy)?;
        let events = EventLog::new(config.event_capacity);
        let mut factory = Self {
            registries,
            config,
            strategy,
            sim_state: SimState::new(),
            paused: false,
            grid: GridIndex::new(),
            network: ConveyorNetwork::new(),
            units: SlotMap::with_key(),
            storages: SlotMap::with_key(),
            item_ids: TransitItemIdGen::new(),
            stats: FactoryStats::default(),
            commands: CommandQueue::new(),
            events,
            last_state_hash: 0,
        };
        factory.last_state_hash = factory.compute_state_hash();
        Ok(factory)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Swap the definition tables. Running units keep the recipe they were
    /// placed with.
    pub fn set_registries(&mut self, registries: Arc<Registries>) {
        debug!(
            items = registries.items.len(),
            recipes = registries.recipes.len(),
            "registries replaced"
        );
        self.registries = registries;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn strategy(&self) -> &SimulationStrategy {
        &self.strategy
    }

    pub fn tick_count(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn elapsed(&self) -> Fixed64 {
        self.sim_state.elapsed
    }

    pub fn stats(&self) -> &FactoryStats {
        &self.stats
    }

    pub fn network(&self) -> &ConveyorNetwork {
        &self.network
    }

    pub fn segment(&self, id: SegmentId) -> Option<&ConveyorSegment> {
        self.network.get(id)
    }

    pub fn unit(&self, id: UnitId) -> Option<&ProductionUnit> {
        self.units.get(id)
    }

    pub fn storage(&self, id: StorageId) -> Option<&StorageBox> {
        self.storages.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &ProductionUnit)> {
        self.units.iter()
    }

    pub fn storages(&self) -> impl Iterator<Item = (StorageId, &StorageBox)> {
        self.storages.iter()
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn is_occupied(&self, position: GridPosition) -> bool {
        self.grid.is_occupied(position)
    }

    pub fn entity_at(&self, position: GridPosition) -> Option<EntityRef> {
        self.grid.entity_at(position)
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Segment(id) => self.network.contains(id),
            EntityRef::Unit(id) => self.units.contains_key(id),
            EntityRef::Storage(id) => self.storages.contains_key(id),
        }
    }

    /// Units held as discrete items anywhere: on belts, in unit buffers and
    /// in storage output slots.
    pub fn units_in_flight(&self) -> u64 {
        let belts: u64 = self
            .network
            .iter()
            .flat_map(|(_, seg)| {
                crate::item::LaneId::ALL
                    .into_iter()
                    .flat_map(move |lane| seg.lane(lane).items())
            })
            .map(|item| u64::from(item.amount))
            .sum();
        let units: u64 = self
            .units
            .values()
            .map(|unit| {
                let inputs: u64 = unit
                    .inputs()
                    .flat_map(|(_, q)| q.iter())
                    .map(|item| u64::from(item.amount))
                    .sum();
                inputs + unit.output().map_or(0, |item| u64::from(item.amount))
            })
            .sum();
        let storage: u64 = self
            .storages
            .values()
            .filter_map(StorageBox::output)
            .map(|item| u64::from(item.amount))
            .sum();
        belts + units + storage
    }

    /// Units held in storage ledgers.
    pub fn units_in_storage(&self) -> u64 {
        self.storages.values().map(|s| u64::from(s.total())).sum()
    }

    /// Hash of the full simulation state as it is now.
    pub fn state_hash(&self) -> u64 {
        self.compute_state_hash()
    }

    /// Hash recorded at the end of the most recent tick.
    pub fn last_tick_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a belt segment of the configured length.
    pub fn place_conveyor(
        &mut self,
        position: GridPosition,
        direction: Direction,
        speed: Fixed64,
    ) -> Result<SegmentId, SimError> {
        let segment =
            ConveyorSegment::new(position, direction, speed, self.config.segment_length);
        let id = self.network.place(segment, &mut self.grid)?;
        self.placed(EntityRef::Segment(id), position);
        Ok(id)
    }

    /// Place a miner producing `resource` at `rate` items per second.
    pub fn place_miner(
        &mut self,
        position: GridPosition,
        facing: Direction,
        resource: ItemTypeId,
        rate: Fixed64,
    ) -> Result<UnitId, SimError> {
        self.grid.ensure_free(position)?;
        self.registries.items.lookup(resource)?;
        let unit = ProductionUnit::miner(position, facing, resource, rate)?;
        Ok(self.insert_unit(unit))
    }

    /// Place a machine running a registered recipe.
    pub fn place_machine(
        &mut self,
        position: GridPosition,
        facing: Direction,
        recipe: RecipeId,
    ) -> Result<UnitId, SimError> {
        self.grid.ensure_free(position)?;
        let def = self.registries.recipes.lookup(recipe)?;
        let unit = ProductionUnit::machine(
            position,
            facing,
            recipe,
            def.recipe.clone(),
            self.config.input_buffer_cycles,
        );
        Ok(self.insert_unit(unit))
    }

    /// Place a storage box. Dispensed items leave through `facing`.
    pub fn place_storage(
        &mut self,
        position: GridPosition,
        facing: Direction,
        capacity: u32,
    ) -> Result<StorageId, SimError> {
        if capacity == 0 {
            return Err(SimError::InvalidParameter(
                "storage capacity must be positive".into(),
            ));
        }
        self.grid.ensure_free(position)?;
        let id = self
            .storages
            .insert(StorageBox::new(position, facing, capacity));
        self.grid.place(position, EntityRef::Storage(id))?;
        self.placed(EntityRef::Storage(id), position);
        Ok(id)
    }

    fn insert_unit(&mut self, unit: ProductionUnit) -> UnitId {
        let position = unit.position;
        let id = self.units.insert(unit);
        // The cell was checked free before the unit was built.
        if let Err(err) = self.grid.place(position, EntityRef::Unit(id)) {
            warn!(%err, "grid rejected a checked cell");
        }
        self.placed(EntityRef::Unit(id), position);
        id
    }

    fn placed(&mut self, entity: EntityRef, position: GridPosition) {
        debug!(?entity, x = position.x, z = position.z, "entity placed");
        self.events.push(Event::EntityPlaced {
            entity,
            tick: self.sim_state.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Removal & activity
    // -----------------------------------------------------------------------

    /// Remove an entity now, discarding any items it holds.
    pub fn remove(&mut self, entity: EntityRef) -> Result<(), SimError> {
        let (position, items, ledger_units) = match entity {
            EntityRef::Segment(id) => {
                let position = self
                    .network
                    .get(id)
                    .map(|s| s.position)
                    .ok_or(SimError::NotFound(entity))?;
                (position, self.network.remove(id, &mut self.grid)?, 0)
            }
            EntityRef::Unit(id) => {
                let mut unit = self.units.remove(id).ok_or(SimError::NotFound(entity))?;
                self.grid.remove(unit.position);
                (unit.position, unit.drain_items(), 0)
            }
            EntityRef::Storage(id) => {
                let mut storage = self.storages.remove(id).ok_or(SimError::NotFound(entity))?;
                self.grid.remove(storage.position);
                let (output, units) = storage.drain();
                (storage.position, output.into_iter().collect(), units)
            }
        };

        let tick = self.sim_state.tick;
        let item_units: u64 = items.iter().map(|i| u64::from(i.amount)).sum();
        if !items.is_empty() || ledger_units > 0 {
            warn!(
                ?entity,
                items = items.len(),
                stored_units = ledger_units,
                "removal discarded contents"
            );
        }
        for item in &items {
            self.events.push(Event::ItemDiscarded {
                entity,
                item_type: item.item_type,
                amount: item.amount,
                tick,
            });
        }
        self.stats.discarded += item_units + u64::from(ledger_units);

        debug!(?entity, x = position.x, z = position.z, "entity removed");
        self.events.push(Event::EntityRemoved { entity, tick });
        Ok(())
    }

    /// Switch an entity on or off. Inactive entities keep everything they
    /// hold: belts freeze, units stop their timer, storage stops
    /// dispensing and refuses deliveries.
    pub fn set_active(&mut self, entity: EntityRef, active: bool) -> Result<(), SimError> {
        match entity {
            EntityRef::Segment(id) => self.network.set_active(id, active)?,
            EntityRef::Unit(id) => {
                self.units.get_mut(id).ok_or(SimError::NotFound(entity))?.active = active;
            }
            EntityRef::Storage(id) => {
                self.storages.get_mut(id).ok_or(SimError::NotFound(entity))?.active = active;
            }
        }
        debug!(?entity, active, "activity changed");
        Ok(())
    }

    /// Queue a command for the next tick boundary.
    pub fn queue(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    // -----------------------------------------------------------------------
    // Storage and unit access
    // -----------------------------------------------------------------------

    /// Withdraw exactly `amount` units from a storage box.
    pub fn take_resource(
        &mut self,
        storage: StorageId,
        item_type: ItemTypeId,
        amount: u32,
    ) -> Result<u32, SimError> {
        let store = self
            .storages
            .get_mut(storage)
            .ok_or(SimError::NotFound(EntityRef::Storage(storage)))?;
        let taken = store.take_resource(item_type, amount)?;
        self.stats.withdrawn += u64::from(taken);
        Ok(taken)
    }

    /// Choose what a storage box dispenses, or stop dispensing.
    pub fn set_dispense(
        &mut self,
        storage: StorageId,
        item_type: Option<ItemTypeId>,
    ) -> Result<(), SimError> {
        if let Some(ty) = item_type {
            self.registries.items.lookup(ty)?;
        }
        self.storages
            .get_mut(storage)
            .ok_or(SimError::NotFound(EntityRef::Storage(storage)))?
            .set_dispense(item_type);
        Ok(())
    }

    /// Pull a finished item straight out of a unit's output slot. The item
    /// leaves the factory.
    pub fn take_item(&mut self, unit: UnitId) -> Result<Option<TransitItem>, SimError> {
        let item = self
            .units
            .get_mut(unit)
            .ok_or(SimError::NotFound(EntityRef::Unit(unit)))?
            .take_item();
        if let Some(item) = &item {
            self.stats.withdrawn += u64::from(item.amount);
        }
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// While paused, `tick`, `advance` and `step` do nothing. Placement and
    /// removal still work.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run exactly one tick of `dt` seconds. Negative `dt` is treated as 0.
    pub fn tick(&mut self, dt: Fixed64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.paused {
            self.step_internal(dt.max(Fixed64::ZERO), &mut result);
        }
        result
    }

    /// Run one tick of the configured `tick_seconds`.
    pub fn step(&mut self) -> AdvanceResult {
        self.tick(self.config.tick_seconds)
    }

    /// Advance by `elapsed` seconds according to the strategy.
    ///
    /// - **Variable**: one tick of `elapsed`.
    /// - **Fixed**: `elapsed` is accumulated and as many whole timesteps run
    ///   as fit; the remainder carries to the next call.
    pub fn advance(&mut self, elapsed: Fixed64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if self.paused {
            return result;
        }
        let elapsed = elapsed.max(Fixed64::ZERO);
        match self.strategy {
            SimulationStrategy::Variable => self.step_internal(elapsed, &mut result),
            SimulationStrategy::Fixed { timestep } => {
                self.sim_state.accumulator = self.sim_state.accumulator.saturating_add(elapsed);
                while self.sim_state.accumulator >= timestep {
                    self.sim_state.accumulator -= timestep;
                    self.step_internal(timestep, &mut result);
                }
            }
        }
        result
    }

    fn step_internal(&mut self, dt: Fixed64, result: &mut AdvanceResult) {
        // Phase 1: Pre-tick.
        result.commands_applied += self.phase_pre_tick();

        // Phase 2: Production.
        self.phase_production(dt);

        // Phase 3: Conveyors.
        self.network.advance(dt, self.config.min_item_spacing);

        // Phase 4: Hand-offs.
        self.phase_handoffs();

        // Phase 5: Bookkeeping.
        self.sim_state.tick += 1;
        self.sim_state.elapsed = self.sim_state.elapsed.saturating_add(dt);
        self.last_state_hash = self.compute_state_hash();
        result.ticks_run += 1;
    }

    fn phase_pre_tick(&mut self) -> usize {
        let commands = self.commands.drain();
        let count = commands.len();
        for command in commands {
            let outcome = match command {
                Command::Remove(entity) => self.remove(entity),
                Command::SetActive { entity, active } => self.set_active(entity, active),
            };
            if let Err(err) = outcome {
                warn!(?command, %err, "queued command skipped");
            }
        }
        count
    }

    fn phase_production(&mut self, dt: Fixed64) {
        let tick = self.sim_state.tick;
        for (id, unit) in self.units.iter_mut() {
            match unit.tick(dt, &mut self.item_ids) {
                CycleOutcome::Completed {
                    item,
                    item_type,
                    amount,
                    consumed,
                } => {
                    self.stats.produced += u64::from(amount);
                    for (consumed_type, quantity) in consumed {
                        self.stats.consumed += u64::from(quantity);
                        self.events.push(Event::ItemsConsumed {
                            unit: id,
                            item_type: consumed_type,
                            quantity,
                            tick,
                        });
                    }
                    self.events.push(Event::ItemProduced {
                        unit: id,
                        item,
                        item_type,
                        tick,
                    });
                }
                CycleOutcome::Starved { first: true } => {
                    debug!(unit = ?id, "unit starved for inputs");
                    self.events.push(Event::UnitStarved { unit: id, tick });
                }
                CycleOutcome::Starved { first: false }
                | CycleOutcome::Inactive
                | CycleOutcome::Blocked
                | CycleOutcome::Progressing => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    pub(crate) fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);
        hasher.write_fixed64(self.sim_state.elapsed);
        hasher.write_u64(self.item_ids.issued());
        hasher.write_u64(self.hash_conveyors());
        hasher.write_u64(self.hash_units());
        hasher.write_u64(self.hash_storage());
        hasher.finish()
    }

    pub(crate) fn hash_conveyors(&self) -> u64 {
        let mut hasher = StateHash::new();
        for (_, seg) in self.network.iter() {
            hash_position(&mut hasher, seg.position);
            hasher.write_u32(seg.direction as u32);
            hasher.write_fixed64(seg.speed);
            hasher.write_fixed64(seg.length);
            hasher.write(&[u8::from(seg.active)]);
            for lane in crate::item::LaneId::ALL {
                hasher.write_u32(seg.lane(lane).len() as u32);
                for item in seg.lane(lane).items() {
                    hash_item(&mut hasher, item);
                }
            }
        }
        hasher.finish()
    }

    pub(crate) fn hash_units(&self) -> u64 {
        let mut hasher = StateHash::new();
        for (_, unit) in self.units.iter() {
            hash_position(&mut hasher, unit.position);
            hasher.write_u32(unit.facing as u32);
            hasher.write_fixed64(unit.timer());
            hasher.write_u32(unit.state() as u32);
            hasher.write(&[u8::from(unit.active), u8::from(unit.is_starved())]);
            for (ty, queue) in unit.inputs() {
                hasher.write_u32(ty.0);
                for item in queue {
                    hash_item(&mut hasher, item);
                }
            }
            if let Some(item) = unit.output() {
                hash_item(&mut hasher, item);
            }
        }
        hasher.finish()
    }

    pub(crate) fn hash_storage(&self) -> u64 {
        let mut hasher = StateHash::new();
        for (_, store) in self.storages.iter() {
            hash_position(&mut hasher, store.position);
            hasher.write_u32(store.facing as u32);
            hasher.write_u32(store.capacity());
            hasher.write(&[u8::from(store.active)]);
            hasher.write_u32(store.dispense().map_or(u32::MAX, |ty| ty.0));
            for (ty, amount) in store.ledger() {
                hasher.write_u32(ty.0);
                hasher.write_u32(amount);
            }
            if let Some(item) = store.output() {
                hash_item(&mut hasher, item);
            }
        }
        hasher.finish()
    }
}

fn hash_position(hasher: &mut StateHash, position: GridPosition) {
    hasher.write_i32(position.x);
    hasher.write_i32(position.z);
}

fn hash_item(hasher: &mut StateHash, item: &TransitItem) {
    hasher.write_u64(item.id.0);
    hasher.write_u32(item.item_type.0);
    hasher.write_u32(item.amount);
    hasher.write_fixed64(item.progress);
}

pub(crate) fn validate_config(
    config: &SimConfig,
    strategy: &SimulationStrategy,
) -> Result<(), SimError> {
    let invalid = |what: &str, value: Fixed64| {
        Err(SimError::InvalidParameter(format!("{what} must be positive, got {value}")))
    };
    if config.tick_seconds <= Fixed64::ZERO {
        return invalid("tick_seconds", config.tick_seconds);
    }
    if config.segment_length <= Fixed64::ZERO {
        return invalid("segment_length", config.segment_length);
    }
    if config.min_item_spacing <= Fixed64::ZERO || config.min_item_spacing > Fixed64::ONE {
        return Err(SimError::InvalidParameter(format!(
            "min_item_spacing must be in (0, 1], got {}",
            config.min_item_spacing
        )));
    }
    if !(config.grid.cell_size > 0.0) {
        return Err(SimError::InvalidParameter(format!(
            "cell_size must be positive, got {}",
            config.grid.cell_size
        )));
    }
    if let SimulationStrategy::Fixed { timestep } = *strategy
        && timestep <= Fixed64::ZERO
    {
        return invalid("timestep", timestep);
    }
    Ok(())
}
