//! # In-Memory Document Store
//!
//! The reference implementation of the store contract, used by the test
//! suites and by operator rehearsals that should not touch the live
//! event database. All collections live behind a single lock so a batch
//! write is trivially all-or-nothing; subscriber fan-out follows the
//! unbounded-channel pattern, with dead receivers pruned on send failure.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::errors::StoreError;
use crate::store::{matches_all, BatchOp, ChangeEvent, ChangeKind, DocumentStore, Predicate};

struct Subscriber {
    id: u64,
    predicates: Vec<Predicate>,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

/// One applied mutation, kept with its before/after images so subscriber
/// notifications can classify the change per-subscription.
struct AppliedChange {
    collection: String,
    id: String,
    before: Option<Value>,
    after: Option<Value>,
}

/// Thread-safe in-memory store.
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    /// Monotonic write sequence, handed out as the server timestamp.
    sequence: AtomicU64,
    next_subscriber_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Test/demo convenience: inserts documents directly, emitting the
    /// same change events a batched create would.
    pub fn seed(&self, collection: &str, docs: Vec<(String, Value)>) {
        let changes: Vec<AppliedChange> = {
            let mut guard = self.collections.lock().expect("MemoryStore lock poisoned");
            let coll = guard.entry(collection.to_string()).or_default();
            docs.into_iter()
                .map(|(id, doc)| {
                    let before = coll.insert(id.clone(), doc.clone());
                    AppliedChange {
                        collection: collection.to_string(),
                        id,
                        before,
                        after: Some(doc),
                    }
                })
                .collect()
        };
        self.sequence.fetch_add(1, Ordering::Relaxed);
        self.fan_out(&changes);
    }

    /// Validates every op against the current state. Any violation aborts
    /// the batch before anything is touched.
    fn validate(
        guard: &HashMap<String, BTreeMap<String, Value>>,
        ops: &[BatchOp],
    ) -> Result<(), StoreError> {
        for op in ops {
            match op {
                BatchOp::Create { collection, id, .. } => {
                    if guard
                        .get(collection)
                        .is_some_and(|coll| coll.contains_key(id))
                    {
                        return Err(StoreError::Aborted(format!(
                            "create of existing document {}/{}",
                            collection, id
                        )));
                    }
                }
                BatchOp::Update {
                    collection,
                    id,
                    expect,
                    ..
                } => {
                    let Some(doc) = guard.get(collection).and_then(|coll| coll.get(id)) else {
                        return Err(StoreError::Aborted(format!(
                            "update of missing document {}/{}",
                            collection, id
                        )));
                    };
                    if let Some(expected) = expect {
                        for (field, value) in expected {
                            if doc.get(field) != Some(value) {
                                return Err(StoreError::Aborted(format!(
                                    "precondition failed on {}/{}: field '{}'",
                                    collection, id, field
                                )));
                            }
                        }
                    }
                }
                BatchOp::Delete { .. } => {}
            }
        }
        Ok(())
    }

    /// Notifies subscribers of a set of applied changes, classifying each
    /// change against the subscription's predicates and pruning
    /// subscribers whose receivers are gone.
    fn fan_out(&self, changes: &[AppliedChange]) {
        let mut subs = self.subscribers.lock().expect("MemoryStore lock poisoned");
        for change in changes {
            let Some(list) = subs.get_mut(&change.collection) else {
                continue;
            };
            list.retain(|sub| {
                let matched_before = change
                    .before
                    .as_ref()
                    .is_some_and(|d| matches_all(d, &sub.predicates));
                let matched_after = change
                    .after
                    .as_ref()
                    .is_some_and(|d| matches_all(d, &sub.predicates));

                let kind = match (matched_before, matched_after) {
                    (false, true) => ChangeKind::Added,
                    (true, true) => ChangeKind::Modified,
                    (true, false) => ChangeKind::Removed,
                    (false, false) => return true,
                };

                let event = ChangeEvent {
                    kind,
                    collection: change.collection.clone(),
                    id: change.id.clone(),
                    doc: if kind == ChangeKind::Removed {
                        None
                    } else {
                        change.after.clone()
                    },
                };
                match sub.sender.send(event) {
                    Ok(()) => true,
                    Err(_) => {
                        log::debug!(
                            "Subscriber {} on '{}' disconnected. Removing.",
                            sub.id,
                            change.collection
                        );
                        false
                    }
                }
            });
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.lock().expect("MemoryStore lock poisoned");
        Ok(guard
            .get(collection)
            .and_then(|coll| coll.get(id))
            .cloned())
    }

    async fn query_documents(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.lock().expect("MemoryStore lock poisoned");
        Ok(guard
            .get(collection)
            .map(|coll| {
                coll.values()
                    .filter(|doc| matches_all(doc, predicates))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.lock().expect("MemoryStore lock poisoned");
        subs.entry(collection.to_string()).or_default().push(Subscriber {
            id,
            predicates,
            sender: tx,
        });
        log::debug!("Subscriber {} registered on '{}'", id, collection);
        rx
    }

    async fn atomic_batch_write(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let changes: Vec<AppliedChange> = {
            let mut guard = self.collections.lock().expect("MemoryStore lock poisoned");

            // Phase 1: validate everything before touching anything.
            Self::validate(&guard, &ops)?;

            // Phase 2: apply. No fallible paths below this line.
            let mut changes = Vec::with_capacity(ops.len());
            for op in ops {
                match op {
                    BatchOp::Create { collection, id, doc } => {
                        let coll = guard.entry(collection.clone()).or_default();
                        coll.insert(id.clone(), doc.clone());
                        changes.push(AppliedChange {
                            collection,
                            id,
                            before: None,
                            after: Some(doc),
                        });
                    }
                    BatchOp::Update {
                        collection,
                        id,
                        fields,
                        ..
                    } => {
                        let coll = guard.entry(collection.clone()).or_default();
                        let doc = coll.get_mut(&id).expect("validated above");
                        let before = doc.clone();
                        if let Value::Object(map) = doc {
                            for (field, value) in fields {
                                map.insert(field, value);
                            }
                        }
                        changes.push(AppliedChange {
                            collection,
                            id,
                            before: Some(before),
                            after: Some(doc.clone()),
                        });
                    }
                    BatchOp::Delete { collection, id } => {
                        let removed = guard
                            .get_mut(&collection)
                            .and_then(|coll| coll.remove(&id));
                        if let Some(before) = removed {
                            changes.push(AppliedChange {
                                collection,
                                id,
                                before: Some(before),
                                after: None,
                            });
                        }
                    }
                }
            }
            changes
        };

        self.sequence.fetch_add(1, Ordering::Relaxed);
        self.fan_out(&changes);
        Ok(())
    }

    fn server_timestamp(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn failed_precondition_leaves_batch_unapplied() {
        let store = MemoryStore::new();
        store.seed("prizes", vec![("p1".into(), json!({"remaining": 1}))]);

        let result = store
            .atomic_batch_write(vec![
                BatchOp::create("winners", "w1", json!({"attendeeId": "a"})),
                BatchOp::update_if(
                    "prizes",
                    "p1",
                    obj(&[("remaining", json!(0))]),
                    obj(&[("remaining", json!(2))]), // stale expectation
                ),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::Aborted(_))));
        // Neither op applied: winner absent, stock untouched.
        assert!(store.get_document("winners", "w1").await.unwrap().is_none());
        let prize = store.get_document("prizes", "p1").await.unwrap().unwrap();
        assert_eq!(prize["remaining"], json!(1));
    }

    #[tokio::test]
    async fn update_merges_fields_and_preserves_others() {
        let store = MemoryStore::new();
        store.seed(
            "attendees",
            vec![("a".into(), json!({"name": "Ada", "isEligible": true}))],
        );
        store
            .atomic_batch_write(vec![BatchOp::update(
                "attendees",
                "a",
                obj(&[("isEligible", json!(false))]),
            )])
            .await
            .unwrap();

        let doc = store.get_document("attendees", "a").await.unwrap().unwrap();
        assert_eq!(doc["name"], json!("Ada"));
        assert_eq!(doc["isEligible"], json!(false));
    }

    #[tokio::test]
    async fn subscription_classifies_membership_changes() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("attendees", vec![Predicate::eq("isEligible", true)]);

        store.seed(
            "attendees",
            vec![("a".into(), json!({"id": "a", "isEligible": true}))],
        );
        let added = rx.recv().await.unwrap();
        assert_eq!(added.kind, ChangeKind::Added);

        // Flipping eligibility off takes the doc out of the filtered view.
        store
            .atomic_batch_write(vec![BatchOp::update(
                "attendees",
                "a",
                obj(&[("isEligible", json!(false))]),
            )])
            .await
            .unwrap();
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.kind, ChangeKind::Removed);
        assert!(removed.doc.is_none());
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_tolerated() {
        let store = MemoryStore::new();
        store
            .atomic_batch_write(vec![BatchOp::delete("winners", "nope")])
            .await
            .unwrap();
    }

    #[test]
    fn server_timestamps_increase() {
        let store = MemoryStore::new();
        let a = store.server_timestamp();
        let b = store.server_timestamp();
        assert!(b > a);
    }
}
