//! Read-only snapshots for presentation.
//!
//! Every type here is an owned copy; nothing borrows into the factory. World
//! positions are derived on the fly from lane progress and are never stored
//! by the simulation.

use crate::factory::{Factory, FactoryStats};
use crate::fixed::{Fixed64, Ticks};
use crate::grid::{Direction, GridPosition, WorldPos};
use crate::id::{ItemTypeId, RecipeId, SegmentId, StorageId, TransitItemId, UnitId};
use crate::item::{LaneId, TransitItem};
use crate::production::{UnitKind, UnitState};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One item riding a belt.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub id: TransitItemId,
    pub item_type: ItemTypeId,
    pub amount: u32,
    pub lane: LaneId,
    pub progress: Fixed64,
    pub world: WorldPos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSnapshot {
    pub id: SegmentId,
    pub position: GridPosition,
    pub direction: Direction,
    pub speed: Fixed64,
    pub active: bool,
    pub input_point: WorldPos,
    pub output_point: WorldPos,
    pub connected: Vec<SegmentId>,
    /// Far lane first, each lane front to back.
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub kind: UnitKind,
    pub position: GridPosition,
    pub facing: Direction,
    pub recipe: Option<RecipeId>,
    pub state: UnitState,
    pub active: bool,
    /// Cycle progress as a 0..1 fraction.
    pub progress: Fixed64,
    /// Buffered count per input type.
    pub inputs: Vec<(ItemTypeId, u32)>,
    pub output: Option<ItemTypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSnapshot {
    pub id: StorageId,
    pub position: GridPosition,
    pub facing: Direction,
    pub active: bool,
    pub capacity: u32,
    pub contents: Vec<(ItemTypeId, u32)>,
    pub dispense: Option<ItemTypeId>,
    pub output: Option<ItemTypeId>,
}

/// Everything at once.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorySnapshot {
    pub tick: Ticks,
    pub elapsed: Fixed64,
    pub segments: Vec<SegmentSnapshot>,
    pub units: Vec<UnitSnapshot>,
    pub storages: Vec<StorageSnapshot>,
    pub stats: FactoryStats,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Factory {
    pub fn snapshot_segment(&self, id: SegmentId) -> Option<SegmentSnapshot> {
        let seg = self.network.get(id)?;
        let grid = &self.config.grid;
        let items = LaneId::ALL
            .into_iter()
            .flat_map(|lane| {
                seg.lane(lane).items().map(move |item| ItemView {
                    id: item.id,
                    item_type: item.item_type,
                    amount: item.amount,
                    lane,
                    progress: item.progress,
                    world: seg.item_world_pos(lane, item.progress, grid),
                })
            })
            .collect();
        Some(SegmentSnapshot {
            id,
            position: seg.position,
            direction: seg.direction,
            speed: seg.speed,
            active: seg.active,
            input_point: seg.input_point(grid),
            output_point: seg.output_point(grid),
            connected: seg.connected().to_vec(),
            items,
        })
    }

    pub fn snapshot_unit(&self, id: UnitId) -> Option<UnitSnapshot> {
        let unit = self.units.get(id)?;
        let duration = unit.recipe().duration;
        let progress = if duration > Fixed64::ZERO {
            (unit.timer() / duration).min(Fixed64::ONE)
        } else {
            Fixed64::ZERO
        };
        Some(UnitSnapshot {
            id,
            kind: unit.kind(),
            position: unit.position,
            facing: unit.facing,
            recipe: unit.recipe_id(),
            state: unit.state(),
            active: unit.active,
            progress,
            inputs: unit
                .inputs()
                .map(|(ty, queue)| (ty, queue.len() as u32))
                .collect(),
            output: unit.output().map(|item| item.item_type),
        })
    }

    pub fn snapshot_storage(&self, id: StorageId) -> Option<StorageSnapshot> {
        let store = self.storages.get(id)?;
        Some(StorageSnapshot {
            id,
            position: store.position,
            facing: store.facing,
            active: store.active,
            capacity: store.capacity(),
            contents: store.ledger().collect(),
            dispense: store.dispense(),
            output: store.output().map(|item| item.item_type),
        })
    }

    pub fn snapshot(&self) -> FactorySnapshot {
        FactorySnapshot {
            tick: self.sim_state.tick,
            elapsed: self.sim_state.elapsed,
            segments: self
                .network
                .ids()
                .into_iter()
                .filter_map(|id| self.snapshot_segment(id))
                .collect(),
            units: self
                .units
                .keys()
                .filter_map(|id| self.snapshot_unit(id))
                .collect(),
            storages: self
                .storages
                .keys()
                .filter_map(|id| self.snapshot_storage(id))
                .collect(),
            stats: self.stats.clone(),
        }
    }

    /// Every item currently riding a belt, with the segment that owns it.
    pub fn items_on_belts(&self) -> Vec<(SegmentId, LaneId, TransitItem)> {
        self.network
            .iter()
            .flat_map(|(id, seg)| {
                LaneId::ALL.into_iter().flat_map(move |lane| {
                    seg.lane(lane).items().map(move |item| (id, lane, item.clone()))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::fixed::Fixed64;
    use crate::grid::{Direction, GridPosition, WorldPos};
    use crate::item::LaneId;
    use crate::production::{UnitKind, UnitState};
    use crate::test_utils::*;

    #[test]
    fn segment_snapshot_reports_world_positions() {
        let (mut factory, ore) = test_factory();
        let belt = factory
            .place_conveyor(GridPosition::new(0, 0), Direction::East, Fixed64::ONE)
            .unwrap();
        inject(&mut factory, belt, LaneId::Far, ore);
        run_seconds(&mut factory, Fixed64::from_num(0.5));

        let snap = factory.snapshot_segment(belt).unwrap();
        assert_eq!(snap.input_point, WorldPos::new(0.0, 0.5));
        assert_eq!(snap.items.len(), 1);
        let item = &snap.items[0];
        assert_eq!(item.lane, LaneId::Far);
        assert_eq!(item.progress, Fixed64::from_num(0.5));
        assert_eq!(item.world, WorldPos::new(0.5, 0.75));
    }

    #[test]
    fn unit_snapshot_reports_progress() {
        let (mut factory, ore) = test_factory();
        let miner = factory
            .place_miner(GridPosition::new(0, 0), Direction::East, ore, Fixed64::ONE)
            .unwrap();
        run_seconds(&mut factory, Fixed64::from_num(0.25));

        let snap = factory.snapshot_unit(miner).unwrap();
        assert_eq!(snap.kind, UnitKind::Miner);
        assert_eq!(snap.state, UnitState::Producing);
        assert_eq!(snap.progress, Fixed64::from_num(0.25));
        assert!(snap.inputs.is_empty());
    }

    #[test]
    fn full_snapshot_lists_everything() {
        let (mut factory, ore) = test_factory();
        factory
            .place_miner(GridPosition::new(0, 0), Direction::East, ore, Fixed64::ONE)
            .unwrap();
        factory
            .place_conveyor(GridPosition::new(1, 0), Direction::East, Fixed64::ONE)
            .unwrap();
        let store = factory
            .place_storage(GridPosition::new(2, 0), Direction::East, 10)
            .unwrap();
        run_seconds(&mut factory, Fixed64::from_num(3));

        let snap = factory.snapshot();
        assert_eq!(snap.segments.len(), 1);
        assert_eq!(snap.units.len(), 1);
        assert_eq!(snap.storages.len(), 1);
        assert_eq!(snap.stats.produced, 3);
        let stored = factory.snapshot_storage(store).unwrap();
        assert_eq!(stored.contents, vec![(ore, 2)]);
    }
}
