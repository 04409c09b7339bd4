//! Save/load via `bitcode` with a versioned header, and per-subsystem hashes
//! for tracking down divergence.
//!
//! The grid index is not stored. It is rebuilt from entity positions on load,
//! so two entities sharing a cell in the data means the data is corrupt.

use crate::conveyor::ConveyorNetwork;
use crate::event::EventLog;
use crate::factory::{Factory, FactoryStats, validate_config};
use crate::command_queue::CommandQueue;
use crate::grid::{GridIndex, GridPosition};
use crate::id::{EntityRef, StorageId, TransitItemIdGen, UnitId};
use crate::production::ProductionUnit;
use crate::registry::Registries;
use crate::sim::{SimConfig, SimState, SimulationStrategy};
use crate::storage::StorageBox;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::debug;

/// Identifies a beltline save.
pub const SAVE_MAGIC: u32 = 0xBE17_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("corrupt save: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count when the save was taken.
    pub tick: u64,
}

impl SaveHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SAVE_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Decode only far enough to report the header.
pub fn read_save_header(data: &[u8]) -> Result<SaveHeader, DeserializeError> {
    let save: FactorySave =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(save.header)
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Everything needed to resume a factory, keyed by entity id. Registries,
/// queued commands and undrained events are not part of a save.
#[derive(Debug, Serialize, Deserialize)]
struct FactorySave {
    header: SaveHeader,
    config: SimConfig,
    strategy: SimulationStrategy,
    sim_state: SimState,
    paused: bool,
    network: ConveyorNetwork,
    units: SlotMap<UnitId, ProductionUnit>,
    storages: SlotMap<StorageId, StorageBox>,
    item_ids: TransitItemIdGen,
    stats: FactoryStats,
    last_tick_hash: u64,
    /// Hash of the state being saved, checked on load.
    state_hash: u64,
}

impl Factory {
    /// Encode the full simulation state.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let save = FactorySave {
            header: SaveHeader::new(self.sim_state.tick),
            config: self.config.clone(),
            strategy: self.strategy.clone(),
            sim_state: self.sim_state.clone(),
            paused: self.paused,
            network: self.network.clone(),
            units: self.units.clone(),
            storages: self.storages.clone(),
            item_ids: self.item_ids.clone(),
            stats: self.stats.clone(),
            last_tick_hash: self.last_state_hash,
            state_hash: self.compute_state_hash(),
        };
        bitcode::serialize(&save).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild a factory from [`Factory::serialize`] output.
    pub fn deserialize(
        data: &[u8],
        registries: Arc<Registries>,
    ) -> Result<Self, DeserializeError> {
        let save: FactorySave =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        save.header.validate()?;
        validate_config(&save.config, &save.strategy)
            .map_err(|e| DeserializeError::Corrupt(e.to_string()))?;

        let grid = rebuild_grid(&save)?;
        let mut network = save.network;
        let positions: Vec<GridPosition> = network.iter().map(|(_, s)| s.position).collect();
        for position in positions {
            network.relink_around(position, &grid);
        }

        let factory = Factory {
            registries,
            events: EventLog::new(save.config.event_capacity),
            config: save.config,
            strategy: save.strategy,
            sim_state: save.sim_state,
            paused: save.paused,
            grid,
            network,
            units: save.units,
            storages: save.storages,
            item_ids: save.item_ids,
            stats: save.stats,
            commands: CommandQueue::new(),
            last_state_hash: save.last_tick_hash,
        };
        let recomputed = factory.compute_state_hash();
        if recomputed != save.state_hash {
            return Err(DeserializeError::Corrupt(format!(
                "state hash mismatch: saved {:016x}, loaded {recomputed:016x}",
                save.state_hash
            )));
        }
        debug!(
            tick = factory.sim_state.tick,
            segments = factory.network.len(),
            units = factory.units.len(),
            storages = factory.storages.len(),
            "factory loaded"
        );
        Ok(factory)
    }

    /// Hashes of each subsystem, to narrow down where two runs diverged.
    pub fn subsystem_hashes(&self) -> SubsystemHashes {
        SubsystemHashes {
            conveyors: self.hash_conveyors(),
            units: self.hash_units(),
            storage: self.hash_storage(),
        }
    }
}

fn rebuild_grid(save: &FactorySave) -> Result<GridIndex, DeserializeError> {
    let mut grid = GridIndex::new();
    let entries = save
        .network
        .iter()
        .map(|(id, s)| (s.position, EntityRef::Segment(id)))
        .chain(save.units.iter().map(|(id, u)| (u.position, EntityRef::Unit(id))))
        .chain(
            save.storages
                .iter()
                .map(|(id, s)| (s.position, EntityRef::Storage(id))),
        );
    for (position, entity) in entries {
        grid.place(position, entity)
            .map_err(|e| DeserializeError::Corrupt(e.to_string()))?;
    }
    Ok(grid)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemHashes {
    pub conveyors: u64,
    pub units: u64,
    pub storage: u64,
}

impl SubsystemHashes {
    /// Names of the subsystems whose hashes differ.
    pub fn diff(&self, other: &SubsystemHashes) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.conveyors != other.conveyors {
            out.push("conveyors");
        }
        if self.units != other.units {
            out.push("units");
        }
        if self.storage != other.storage {
            out.push("storage");
        }
        out
    }
}
