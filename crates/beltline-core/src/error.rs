use crate::grid::GridPosition;
use crate::id::{EntityRef, ItemTypeId};
use crate::item::TransitItem;
use crate::registry::RegistryError;

/// Errors surfaced by the simulation's mutation and query operations.
///
/// None of these are fatal: the caller is told, and every unaffected entity
/// keeps ticking. A belt item waiting on a full target is not an error at all;
/// it is the steady backpressure state visible in the data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// The grid cell already holds an entity.
    #[error("cell ({}, {}) is occupied by {occupant:?}", position.x, position.z)]
    PlacementConflict {
        position: GridPosition,
        occupant: EntityRef,
    },

    /// A storage deposit would push the ledger over its capacity.
    #[error("capacity exceeded: {stored} stored + {incoming} incoming > {capacity}")]
    CapacityExceeded {
        stored: u32,
        incoming: u32,
        capacity: u32,
    },

    /// A withdrawal asked for more than is stored.
    #[error("insufficient stock of {item_type:?}: requested {requested}, available {available}")]
    InsufficientStock {
        item_type: ItemTypeId,
        requested: u32,
        available: u32,
    },

    /// An id passed across the API boundary does not name a live entity.
    #[error("{0:?} not found")]
    NotFound(EntityRef),

    /// A placement or configuration argument is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A registry lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A hand-in that was refused. The item comes back to the caller so a failed
/// transfer can never drop it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: SimError,
    pub item: TransitItem,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TransitItemId;

    #[test]
    fn error_display_messages() {
        let err = SimError::CapacityExceeded {
            stored: 9,
            incoming: 2,
            capacity: 10,
        };
        assert!(err.to_string().contains("capacity exceeded"));

        let err = SimError::InsufficientStock {
            item_type: ItemTypeId(3),
            requested: 5,
            available: 1,
        };
        assert!(err.to_string().contains("requested 5"));
    }

    #[test]
    fn rejected_carries_item_back() {
        let item = TransitItem::new(TransitItemId(7), ItemTypeId(0), 1);
        let rejected = Rejected {
            reason: SimError::InvalidParameter("nope".into()),
            item: item.clone(),
        };
        assert_eq!(rejected.item, item);
        assert_eq!(rejected.to_string(), "invalid parameter: nope");
    }
}
