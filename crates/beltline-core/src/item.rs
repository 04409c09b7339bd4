//! Discrete items moving through the factory.
//!
//! A [`TransitItem`] is owned by value by exactly one holder at a time: a
//! conveyor lane, a unit's output slot, a machine's input buffer, or a storage
//! box's output slot. Moving it between holders is a Rust move, so an item
//! cannot be duplicated by a hand-off. Its owning segment and lane are implied
//! by where it lives; snapshots report them explicitly.

use crate::fixed::Fixed64;
use crate::id::{ItemTypeId, TransitItemId};
use serde::{Deserialize, Serialize};

/// One of the two parallel single-file tracks on a conveyor segment.
///
/// `Far` is the left-hand lane relative to the direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LaneId {
    Far,
    Close,
}

impl LaneId {
    pub const ALL: [LaneId; 2] = [LaneId::Far, LaneId::Close];

    pub fn index(self) -> usize {
        match self {
            LaneId::Far => 0,
            LaneId::Close => 1,
        }
    }
}

/// A discrete item with a stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitItem {
    pub id: TransitItemId,
    pub item_type: ItemTypeId,
    /// Units this item stands for once it is merged into a storage ledger.
    pub amount: u32,
    /// Travel progress along the current segment: 0 = just entered,
    /// 1 = at the output point. Meaningless outside a lane.
    pub progress: Fixed64,
}

impl TransitItem {
    pub fn new(id: TransitItemId, item_type: ItemTypeId, amount: u32) -> Self {
        Self {
            id,
            item_type,
            amount,
            progress: Fixed64::ZERO,
        }
    }

    /// True once the item has reached the end of its segment.
    pub fn at_output(&self) -> bool {
        self.progress >= Fixed64::ONE
    }
}
