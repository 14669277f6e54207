//! Shared fixtures for the end-to-end raffle scenarios.

use serde_json::{json, Value};
use std::sync::Arc;

use lib_draw::{DocumentStore, MemoryStore};

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
pub fn prize_doc(id: &str, tier: &str, remaining: u32) -> Value {
    json!({
        "id": id,
        "name": format!("Prize {}", id.to_uppercase()),
        "description": "",
        "tier": tier,
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
        vec![(prize_id.to_string(), prize_doc(prize_id, "Major", remaining))],
    );
    Arc::new(store)
}

/// Reads one attendee back as a typed model.
pub async fn attendee(store: &MemoryStore, id: &str) -> lib_draw::Attendee {
    let doc = store
        .get_document("attendees", id)
        .await
        .expect("store read")
        .expect("attendee exists");
    serde_json::from_value(doc).expect("valid attendee doc")
}

/// Initializes test logging once; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
