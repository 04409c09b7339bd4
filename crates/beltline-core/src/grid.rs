//! Placement grid: integer cells, world-space snapping, and the occupancy
//! index every placement goes through.

use crate::error::SimError;
use crate::id::EntityRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the placement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub z: i32,
}

impl GridPosition {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The adjacent cell in the given direction.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.x + dx, self.z + dz)
    }

    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.z - other.z).unsigned_abs()
    }
}

/// Cardinal directions. North is +z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Cell offset `(dx, dz)` for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn rotate_cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn rotate_ccw(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }
}

/// A point on the ground plane in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub z: f32,
}

impl WorldPos {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Move `distance` world units along `direction`.
    pub fn offset(self, direction: Direction, distance: f32) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.x + dx as f32 * distance, self.z + dz as f32 * distance)
    }
}

/// Mapping between world space and grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Edge length of one cell in world units.
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 1.0 }
    }
}

impl GridConfig {
    /// The cell containing `pos`.
    pub fn snap_to_grid(&self, pos: WorldPos) -> GridPosition {
        GridPosition::new(
            (pos.x / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    /// The world-space center of `cell`.
    pub fn grid_to_world(&self, cell: GridPosition) -> WorldPos {
        WorldPos::new(
            (cell.x as f32 + 0.5) * self.cell_size,
            (cell.z as f32 + 0.5) * self.cell_size,
        )
    }

    /// Center of the cell nearest to `pos`.
    pub fn snap_world(&self, pos: WorldPos) -> WorldPos {
        self.grid_to_world(self.snap_to_grid(pos))
    }
}

// ---------------------------------------------------------------------------
// GridIndex
// ---------------------------------------------------------------------------

/// Occupancy index: at most one entity per cell.
///
/// Every placement consults [`GridIndex::place`] before an entity is created;
/// it is the only cross-entity consistency guard in the simulation.
#[derive(Debug, Default, Clone)]
pub struct GridIndex {
    cells: BTreeMap<GridPosition, EntityRef>,
}

impl GridIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a free cell for `entity`.
    pub fn place(&mut self, position: GridPosition, entity: EntityRef) -> Result<(), SimError> {
        if let Some(&occupant) = self.cells.get(&position) {
            return Err(SimError::PlacementConflict { position, occupant });
        }
        self.cells.insert(position, entity);
        Ok(())
    }

    /// Release a cell. Returns the entity that held it.
    pub fn remove(&mut self, position: GridPosition) -> Option<EntityRef> {
        self.cells.remove(&position)
    }

    pub fn is_occupied(&self, position: GridPosition) -> bool {
        self.cells.contains_key(&position)
    }

    /// Fail with `PlacementConflict` if the cell is taken.
    pub fn ensure_free(&self, position: GridPosition) -> Result<(), SimError> {
        match self.cells.get(&position) {
            Some(&occupant) => Err(SimError::PlacementConflict { position, occupant }),
            None => Ok(()),
        }
    }

    pub fn entity_at(&self, position: GridPosition) -> Option<EntityRef> {
        self.cells.get(&position).copied()
    }

    /// Occupied 4-neighbours of a cell.
    pub fn neighbors_4(&self, position: GridPosition) -> Vec<(Direction, EntityRef)> {
        Direction::all()
            .into_iter()
            .filter_map(|dir| self.entity_at(position.step(dir)).map(|e| (dir, e)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridPosition, EntityRef)> + '_ {
        self.cells.iter().map(|(&pos, &entity)| (pos, entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{SegmentId, StorageId};
    use slotmap::SlotMap;

    fn entity() -> EntityRef {
        let mut map: SlotMap<SegmentId, ()> = SlotMap::with_key();
        EntityRef::Segment(map.insert(()))
    }

    #[test]
    fn place_and_query() {
        let mut grid = GridIndex::new();
        let e = entity();
        grid.place(GridPosition::new(2, 3), e).unwrap();
        assert!(grid.is_occupied(GridPosition::new(2, 3)));
        assert_eq!(grid.entity_at(GridPosition::new(2, 3)), Some(e));
        assert!(!grid.is_occupied(GridPosition::new(3, 3)));
    }

    #[test]
    fn occupied_cell_conflicts() {
        let mut grid = GridIndex::new();
        let first = entity();
        grid.place(GridPosition::new(0, 0), first).unwrap();

        let mut storages: SlotMap<StorageId, ()> = SlotMap::with_key();
        let second = EntityRef::Storage(storages.insert(()));
        let err = grid.place(GridPosition::new(0, 0), second).unwrap_err();
        assert_eq!(
            err,
            SimError::PlacementConflict {
                position: GridPosition::new(0, 0),
                occupant: first,
            }
        );
        assert_eq!(grid.entity_at(GridPosition::new(0, 0)), Some(first));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_frees_cell() {
        let mut grid = GridIndex::new();
        let e = entity();
        grid.place(GridPosition::new(1, 1), e).unwrap();
        assert_eq!(grid.remove(GridPosition::new(1, 1)), Some(e));
        assert!(grid.is_empty());
        assert!(grid.ensure_free(GridPosition::new(1, 1)).is_ok());
    }

    #[test]
    fn neighbors_found_in_all_directions() {
        let mut grid = GridIndex::new();
        let center = GridPosition::new(5, 5);
        for dir in Direction::all() {
            grid.place(center.step(dir), entity()).unwrap();
        }
        assert_eq!(grid.neighbors_4(center).len(), 4);
        assert!(grid.neighbors_4(GridPosition::new(50, 50)).is_empty());
    }

    #[test]
    fn direction_rotation_round_trips() {
        for dir in Direction::all() {
            assert_eq!(dir.rotate_cw().rotate_ccw(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.rotate_cw().rotate_cw(), dir.opposite());
        }
    }

    #[test]
    fn snap_picks_containing_cell() {
        let cfg = GridConfig { cell_size: 2.0 };
        assert_eq!(cfg.snap_to_grid(WorldPos::new(0.1, 3.9)), GridPosition::new(0, 1));
        assert_eq!(cfg.snap_to_grid(WorldPos::new(-0.1, -2.5)), GridPosition::new(-1, -2));
        assert_eq!(cfg.grid_to_world(GridPosition::new(0, 1)), WorldPos::new(1.0, 3.0));
    }

    #[test]
    fn snap_round_trip_is_idempotent() {
        let cfg = GridConfig::default();
        let p = WorldPos::new(12.73, -4.2);
        let once = cfg.snap_world(p);
        let twice = cfg.snap_world(once);
        assert_eq!(once, twice);
        assert_eq!(once, WorldPos::new(12.5, -4.5));
    }
}
