//! # Error Taxonomy
//!
//! Every external-store failure is caught at a coordinator boundary and
//! converted into one of the `DrawError` kinds below; nothing in the draw
//! workflow propagates as a panic or an unhandled rejection. All variants
//! are recoverable from the operator's point of view: the triggering
//! action is re-enabled and no partial writes are left behind.

use thiserror::Error;

/// Failures of the generic document-store collaborator.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The atomic batch was rejected as a unit. Carries the reason for
    /// logging; callers only branch on the variant.
    #[error("atomic batch aborted: {0}")]
    Aborted(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Failures of the draw workflow, surfaced to the operator.
#[derive(Debug, Clone, Error)]
pub enum DrawError {
    /// No valid draw is possible: the eligible pool is empty, the prize is
    /// out of stock, or the requested count collapsed to zero.
    #[error("no eligible attendees or no prize stock left")]
    EmptyPoolOrOutOfStock,

    /// A commit-time stock re-check failed after the draw was shown. The
    /// operator should redraw against another prize.
    #[error("prize stock exhausted: {remaining} remaining, {needed} needed")]
    OutOfStock { remaining: u32, needed: u32 },

    /// The atomic write kept losing races (or a transient store fault);
    /// the action may simply be retried.
    #[error("conflicting concurrent write: {0}")]
    WriteConflict(String),

    /// A read during synchronization failed; previous cached state was
    /// retained.
    #[error("synchronization read failed: {0}")]
    SyncReadFailure(String),

    /// The requested sequencer action is not legal in the current state.
    #[error("invalid draw-state transition: {0}")]
    InvalidTransition(&'static str),

    /// The engine configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another draw/commit/redraw is already in flight for this
    /// controller; duplicate submissions are rejected, not queued.
    #[error("a draw operation is already in progress")]
    Busy,
}

impl From<StoreError> for DrawError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Aborted(reason) => DrawError::WriteConflict(reason),
            StoreError::NotFound { collection, id } => {
                DrawError::SyncReadFailure(format!("missing document {}/{}", collection, id))
            }
            StoreError::Backend(reason) => DrawError::SyncReadFailure(reason),
        }
    }
}
