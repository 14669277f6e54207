//! # Document Store Contract
//!
//! The generic contract the raffle engine consumes from its backing
//! document database. The engine never talks to a concrete product API;
//! anything that can read documents, push change feeds, and apply an
//! all-or-nothing batch of writes can sit behind this trait.
//!
//! ## Key guarantees required of implementations:
//!
//! - **Atomic batches**: `atomic_batch_write` applies every operation or
//!   none; partial application must never be observable by other readers.
//! - **Compare-and-set**: an `Update` may carry expected current values.
//!   A mismatch aborts the whole batch, which is what lets the commit
//!   coordinator detect a lost race instead of double-spending stock.
//! - **Monotonic sequence**: `server_timestamp` yields an opaque value
//!   that strictly increases across writes, used for winner ordering.

use serde_json::Value;
use std::future::Future;
use tokio::sync::mpsc;

use crate::errors::StoreError;

pub mod memory;

pub use memory::MemoryStore;

/// The kind of change carried by a subscription event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The document now matches the subscription's predicates.
    Added,
    /// The document changed and still matches.
    Modified,
    /// The document was deleted, or no longer matches.
    Removed,
}

/// One push notification from a live subscription.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub collection: String,
    pub id: String,
    /// The document after the change; `None` for deletions.
    pub doc: Option<Value>,
}

/// An equality predicate on a top-level document field. The raffle
/// queries never need anything richer.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub value: Value,
}

impl Predicate {
    /// `field == value`.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Whether a document satisfies this predicate.
    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// Returns true when a document satisfies every predicate in the slice.
pub fn matches_all(doc: &Value, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| p.matches(doc))
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert a new document; aborts the batch if the id already exists.
    Create {
        collection: String,
        id: String,
        doc: Value,
    },
    /// Merge fields into an existing document; aborts if the document is
    /// missing or any `expect` field does not hold its expected value.
    Update {
        collection: String,
        id: String,
        fields: serde_json::Map<String, Value>,
        expect: Option<serde_json::Map<String, Value>>,
    },
    /// Remove a document. Deleting a missing document is a no-op, so a
    /// defensive cleanup can always include it.
    Delete { collection: String, id: String },
}

impl BatchOp {
    pub fn create(collection: &str, id: &str, doc: Value) -> Self {
        BatchOp::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        }
    }

    pub fn update(collection: &str, id: &str, fields: serde_json::Map<String, Value>) -> Self {
        BatchOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
            expect: None,
        }
    }

    /// An update guarded by expected current values (compare-and-set).
    pub fn update_if(
        collection: &str,
        id: &str,
        fields: serde_json::Map<String, Value>,
        expect: serde_json::Map<String, Value>,
    ) -> Self {
        BatchOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
            expect: Some(expect),
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        BatchOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// The async store contract. Implementations must be shareable across
/// tasks; every returned future is `Send` so callers can drive reads and
/// writes from spawned workers.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches a single document, `None` when absent.
    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Fetches every document in a collection satisfying all predicates.
    fn query_documents(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Opens a live feed of changes to documents matching the predicates.
    /// Dropping the receiver unsubscribes.
    fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> mpsc::UnboundedReceiver<ChangeEvent>;

    /// Applies every operation or none of them.
    fn atomic_batch_write(
        &self,
        ops: Vec<BatchOp>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// An opaque value that strictly increases across calls, assigned by
    /// the store rather than the client clock.
    fn server_timestamp(&self) -> u64;
}
