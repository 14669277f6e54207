//! # Redraw Coordinator
//!
//! Reverses a pending, unconfirmed win when the drawn winner(s) cannot
//! be verified present. This is a permanent forfeiture, not a
//! retry-later state: the batch members end in the same terminal
//! eligibility state as a committed winner ("had their chance"), while
//! any winner records for them are removed so the history never claims
//! they won. Prize stock is untouched; stock only moves at confirm time.

use serde_json::json;
use std::sync::Arc;

use crate::config::DrawConfig;
use crate::errors::{DrawError, StoreError};
use crate::models::{fields, Attendee};
use crate::store::{BatchOp, DocumentStore, Predicate};

pub struct RedrawCoordinator<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<DrawConfig>,
}

impl<S: DocumentStore> RedrawCoordinator<S> {
    pub fn new(store: Arc<S>, config: Arc<DrawConfig>) -> Self {
        Self { store, config }
    }

    /// Disqualifies a batch atomically: deletes any winner records for
    /// its members and flips each member permanently ineligible.
    ///
    /// Pre-confirmation there should be no records to delete; the lookup
    /// runs anyway to clean up partial leftovers from earlier faults.
    pub async fn redraw(&self, batch: &[Attendee]) -> Result<(), DrawError> {
        if batch.is_empty() {
            return Err(DrawError::InvalidTransition(
                "redraw requires a drawn batch",
            ));
        }
        let colls = &self.config.collections;
        let mut ops = Vec::with_capacity(batch.len());

        for attendee in batch {
            let stale_records = self
                .store
                .query_documents(
                    &colls.winners,
                    &[Predicate::eq(fields::ATTENDEE_ID, json!(attendee.id))],
                )
                .await?;
            for record in stale_records {
                if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
                    log::warn!(
                        "Redraw cleaning up stale winner record '{}' for attendee '{}'",
                        id,
                        attendee.id
                    );
                    ops.push(BatchOp::delete(&colls.winners, id));
                }
            }

            ops.push(BatchOp::update(
                &colls.attendees,
                &attendee.id,
                [(fields::IS_ELIGIBLE.to_string(), json!(false))]
                    .into_iter()
                    .collect(),
            ));
        }

        match self.store.atomic_batch_write(ops).await {
            Ok(()) => {
                log::info!("Redraw disqualified {} attendee(s)", batch.len());
                Ok(())
            }
            Err(StoreError::Aborted(reason)) => Err(DrawError::WriteConflict(reason)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{attendees_from, seeded_store};
    use crate::store::MemoryStore;

    fn coordinator(store: Arc<MemoryStore>) -> RedrawCoordinator<MemoryStore> {
        RedrawCoordinator::new(store, Arc::new(DrawConfig::default()))
    }

    #[tokio::test]
    async fn redraw_forfeits_eligibility_without_touching_stock() {
        let store = seeded_store(&["a", "b"], "p1", 1);
        let redraw = coordinator(Arc::clone(&store));
        let batch = attendees_from(&store, &["a"]).await;

        redraw.redraw(&batch).await.unwrap();

        let doc = store.get_document("attendees", "a").await.unwrap().unwrap();
        assert_eq!(doc["isEligible"], json!(false));
        let prize = store.get_document("prizes", "p1").await.unwrap().unwrap();
        assert_eq!(prize["remaining"], json!(1));
        assert!(store.query_documents("winners", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redraw_cleans_up_stale_winner_records() {
        let store = seeded_store(&["a"], "p1", 1);
        store.seed(
            "winners",
            vec![(
                "w-stale".into(),
                json!({"id": "w-stale", "attendeeId": "a", "attendeeName": "A",
                       "prizeId": "p1", "prizeName": "P", "prizeTier": "Minor",
                       "timestamp": 1, "committedAt": "2026-01-01T00:00:00Z",
                       "claimed": false}),
            )],
        );
        let redraw = coordinator(Arc::clone(&store));
        let batch = attendees_from(&store, &["a"]).await;

        redraw.redraw(&batch).await.unwrap();
        assert!(store.query_documents("winners", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let store = seeded_store(&[], "p1", 1);
        let redraw = coordinator(store);
        assert!(matches!(
            redraw.redraw(&[]).await,
            Err(DrawError::InvalidTransition(_))
        ));
    }
}
