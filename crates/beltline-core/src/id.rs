use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a conveyor segment placed on the grid.
    pub struct SegmentId;

    /// Identifies a production unit (miner or machine).
    pub struct UnitId;

    /// Identifies a storage box.
    pub struct StorageId;
}

/// Identifies an item type in the item registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a recipe in the recipe registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies one discrete item in transit. Unique for the whole lifetime of
/// a simulation, including across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitItemId(pub u64);

/// Any entity that can occupy a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Segment(SegmentId),
    Unit(UnitId),
    Storage(StorageId),
}

/// Monotonic allocator for [`TransitItemId`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitItemIdGen {
    next: u64,
}

impl TransitItemIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next unused id.
    pub fn allocate(&mut self) -> TransitItemId {
        let id = TransitItemId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}
