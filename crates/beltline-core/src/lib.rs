//! Beltline Core: a deterministic, grid-based conveyor and production
//! simulation.
//!
//! Miners generate items, two-lane conveyor belts carry them cell to cell,
//! machines turn buffered inputs into outputs by recipe, and storage boxes
//! absorb items into a bounded ledger. Everything is single-threaded and
//! ticked in a fixed order so runs are reproducible bit for bit.
//!
//! # Tick Pipeline
//!
//! Each call to [`factory::Factory::tick`] runs:
//!
//! 1. **Pre-tick** -- apply queued removals and activity toggles.
//! 2. **Production** -- miners and machines advance their cycle timers.
//! 3. **Conveyors** -- every active segment moves its items forward.
//! 4. **Hand-offs** -- belt fronts, unit outputs and storage dispensers push
//!    items into whatever sits at their output cell.
//! 5. **Bookkeeping** -- tick counter, elapsed time, state hash.
//!
//! Blocked items and full output slots are plain data, re-checked every tick.
//!
//! # Key Types
//!
//! - [`factory::Factory`] -- owns every entity and runs the pipeline.
//! - [`conveyor::ConveyorNetwork`] -- belt segments, lanes and connectivity.
//! - [`production::ProductionUnit`] -- the miner/machine state machine.
//! - [`storage::StorageBox`] -- bounded resource ledger with optional dispenser.
//! - [`grid::GridIndex`] -- single-occupancy placement index.
//! - [`registry::Registries`] -- item and recipe definitions, shared via `Arc`.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for all simulation time.
//! - [`serialize`] -- versioned save/load via bitcode.

pub mod command_queue;
pub mod conveyor;
pub mod error;
pub mod event;
pub mod factory;
pub mod fixed;
pub mod grid;
pub mod handoff;
pub mod id;
pub mod item;
pub mod production;
pub mod query;
pub mod registry;
pub mod serialize;
pub mod sim;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
