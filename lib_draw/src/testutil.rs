//! Shared fixtures for the in-crate test modules.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::{self, Attendee};
use crate::store::{DocumentStore, MemoryStore};

/// Initializes test logging once; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A checked-in, eligible attendee document.
pub fn attendee_doc(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Attendee {}", id.to_uppercase()),
        "organization": "Acme",
        "avatar": "",
        "checkedIn": true,
        "isEligible": true,
    })
}

/// A prize document with the given remaining stock.
pub fn prize_doc(id: &str, remaining: u32) -> Value {
    json!({
        "id": id,
        "name": format!("Prize {}", id.to_uppercase()),
        "description": "",
        "tier": "Minor",
        "quantity": remaining.max(1),
        "remaining": remaining,
    })
}

/// A store seeded with checked-in eligible attendees and one prize.
pub fn seeded_store(attendee_ids: &[&str], prize_id: &str, remaining: u32) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.seed(
        "attendees",
        attendee_ids
            .iter()
            .map(|id| (id.to_string(), attendee_doc(id)))
            .collect(),
    );
    store.seed(
        "prizes",
        vec![(prize_id.to_string(), prize_doc(prize_id, remaining))],
    );
    Arc::new(store)
}

/// Reads attendees back out of the store as typed models.
pub async fn attendees_from(store: &MemoryStore, ids: &[&str]) -> Vec<Attendee> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let doc = store
            .get_document("attendees", id)
            .await
            .expect("store read")
            .expect("attendee exists");
        out.push(models::from_doc(doc).expect("valid attendee doc"));
    }
    out
}
