//! # Core Raffle Workflow
//!
//! The components of the drawing workflow, wired together by the
//! `DrawController` facade:
//!
//! - **`synchronizer`**: reconciles the in-memory eligible pool and
//!   selected prize with authoritative server state, pull or push.
//! - **`engine`**: uniform winner selection without replacement, with an
//!   injected randomness capability.
//! - **`sequencer`**: the explicit reveal state machine over a drawn
//!   batch; pure, no randomness, no I/O.
//! - **`commit`**: atomic persistence of winners, eligibility flips and
//!   the stock decrement.
//! - **`redraw`**: atomic disqualification of an unconfirmed batch.
//! - **`records`**: read/claim helpers over committed winner records.
//! - **`controller`**: the operator actions and the observable state
//!   stream consumed by the UI layer.

/// Reconciles the eligible pool and prize with server state.
pub mod synchronizer;
/// Uniform random winner selection.
pub mod engine;
/// The reveal workflow state machine.
pub mod sequencer;
/// Atomic winner persistence.
pub mod commit;
/// Atomic batch disqualification.
pub mod redraw;
/// Winner history and claim handling.
pub mod records;
/// The operator facade and state stream.
pub mod controller;

// --- Public API Re-exports ---
pub use commit::CommitCoordinator;
pub use controller::{DrawController, DrawSnapshot};
pub use engine::{DrawEngine, RandomSource, ScriptedRandom, ThreadRandom};
pub use records::WinnerLedger;
pub use redraw::RedrawCoordinator;
pub use sequencer::{DrawingState, RevealSequencer};
pub use synchronizer::{PoolSnapshot, PoolSynchronizer};
