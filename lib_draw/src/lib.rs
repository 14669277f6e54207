//! # lib_draw
//!
//! The raffle allocation engine behind the event prize-drawing tool:
//! pool synchronization against a generic document store, uniform winner
//! selection without replacement, an explicit reveal state machine, and
//! atomic commit/redraw coordination with read-validate-write stock
//! checks.

#![forbid(unsafe_code)]

// Declare the modules to re-export
pub mod config;
pub mod core;
pub mod errors;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the primary types
pub use config::DrawConfig;
pub use crate::core::{
    DrawController, DrawEngine, DrawSnapshot, DrawingState, PoolSnapshot, PoolSynchronizer,
    RandomSource, ScriptedRandom, ThreadRandom, WinnerLedger,
};
pub use errors::{DrawError, StoreError};
pub use models::{Attendee, Prize, PrizeTier, WinnerRecord};
pub use store::{BatchOp, ChangeEvent, ChangeKind, DocumentStore, MemoryStore, Predicate};
