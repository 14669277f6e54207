//! # Pool Synchronizer
//!
//! Owns the engine's view of the eligible attendee pool and the selected
//! prize, and reconciles it with authoritative server state.
//!
//! Two modes:
//!
//! - **Pull**: `sync()` re-reads the prize, the checked-in eligible
//!   attendees and the winner records, re-runs the pool derivation and
//!   replaces the cached snapshot wholesale. Read-only; a failed read
//!   leaves the previous snapshot untouched and surfaces the error.
//! - **Push**: `spawn_feed()` holds the same two queries open as live
//!   subscriptions and re-runs the derivation whenever either feed
//!   emits, republishing the fresh snapshot on a watch channel. Teardown
//!   goes through a `CancellationToken`, and dropping the store-side
//!   receiver ends the subscription.

use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::DrawConfig;
use crate::errors::DrawError;
use crate::models::{self, derive_eligible_pool, fields, Attendee, Prize, WinnerRecord};
use crate::store::{DocumentStore, Predicate};

/// A consistent view of the draw inputs, taken at one point in time.
///
/// The draw engine always operates on a snapshot cloned out of the
/// synchronizer, never on a live-mutating reference, so an in-flight
/// reveal cannot be altered by a concurrent external change.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    /// Eligible attendees: checked in, still eligible, never recorded as
    /// a winner.
    pub attendees: Vec<Attendee>,
    /// The selected prize re-read from the server, if one is selected.
    pub prize: Option<Prize>,
}

pub struct PoolSynchronizer<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<DrawConfig>,
    cached: Mutex<PoolSnapshot>,
}

impl<S: DocumentStore> PoolSynchronizer<S> {
    pub fn new(store: Arc<S>, config: Arc<DrawConfig>) -> Self {
        Self {
            store,
            config,
            cached: Mutex::new(PoolSnapshot::default()),
        }
    }

    /// The last successfully synchronized snapshot.
    pub fn cached(&self) -> PoolSnapshot {
        self.cached.lock().expect("Synchronizer lock poisoned").clone()
    }

    /// The predicates of the live attendee query: checked in and still
    /// eligible.
    fn attendee_predicates() -> Vec<Predicate> {
        vec![
            Predicate::eq(fields::CHECKED_IN, json!(true)),
            Predicate::eq(fields::IS_ELIGIBLE, json!(true)),
        ]
    }

    /// Re-reads everything and replaces the cached snapshot wholesale.
    ///
    /// No retry on failure; the caller decides whether to retry the user
    /// action, and the previous snapshot stays available via `cached()`.
    pub async fn sync(&self, prize_id: Option<&str>) -> Result<PoolSnapshot, DrawError> {
        let colls = &self.config.collections;

        let prize = match prize_id {
            Some(id) => self
                .store
                .get_document(&colls.prizes, id)
                .await?
                .map(models::from_doc::<Prize>)
                .transpose()?,
            None => None,
        };

        let attendee_docs = self
            .store
            .query_documents(&colls.attendees, &Self::attendee_predicates())
            .await?;
        let winner_docs = self.store.query_documents(&colls.winners, &[]).await?;

        let attendees: Vec<Attendee> = attendee_docs
            .into_iter()
            .map(models::from_doc)
            .collect::<Result<_, _>>()?;
        let winners: Vec<WinnerRecord> = winner_docs
            .into_iter()
            .map(models::from_doc)
            .collect::<Result<_, _>>()?;

        let snapshot = PoolSnapshot {
            attendees: derive_eligible_pool(&attendees, &winners),
            prize,
        };

        log::debug!(
            "Pool synchronized: {} eligible, prize={:?}",
            snapshot.attendees.len(),
            snapshot.prize.as_ref().map(|p| p.id.as_str())
        );

        *self.cached.lock().expect("Synchronizer lock poisoned") = snapshot.clone();
        Ok(snapshot)
    }

    /// Starts the push-based feed. Returns a watch receiver carrying the
    /// latest snapshot and a token that tears the feed down when
    /// cancelled.
    ///
    /// Both underlying subscriptions compose into a single recompute: any
    /// insert/update/delete on either feed triggers one full `sync()`.
    /// A failed recompute keeps the previously published snapshot.
    pub fn spawn_feed(
        self: &Arc<Self>,
        prize_id: Option<String>,
    ) -> (watch::Receiver<PoolSnapshot>, CancellationToken) {
        let (tx, rx) = watch::channel(self.cached());
        let token = CancellationToken::new();

        let sync = Arc::clone(self);
        let task_token = token.clone();
        tokio::spawn(async move {
            let mut attendee_rx = sync
                .store
                .subscribe(&sync.config.collections.attendees, Self::attendee_predicates());
            let mut winner_rx = sync
                .store
                .subscribe(&sync.config.collections.winners, Vec::new());

            // Publish an initial authoritative snapshot before reacting
            // to changes.
            match sync.sync(prize_id.as_deref()).await {
                Ok(snapshot) => {
                    let _ = tx.send(snapshot);
                }
                Err(e) => log::warn!("Initial pool sync failed: {}", e),
            }

            loop {
                let fired = tokio::select! {
                    _ = task_token.cancelled() => {
                        log::debug!("Pool feed cancelled.");
                        break;
                    }
                    ev = attendee_rx.recv() => ev.is_some(),
                    ev = winner_rx.recv() => ev.is_some(),
                };
                if !fired {
                    log::warn!("Pool feed closed by the store. Stopping.");
                    break;
                }

                match sync.sync(prize_id.as_deref()).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).is_err() {
                            // No one is watching anymore.
                            break;
                        }
                    }
                    Err(e) => {
                        // Keep the previously published snapshot.
                        log::warn!("Pool recompute failed, keeping last snapshot: {}", e);
                    }
                }
            }
        });

        (rx, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BatchOp, ChangeEvent, MemoryStore};
    use crate::testutil::{attendee_doc, prize_doc, seeded_store};
    use crate::errors::StoreError;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn synchronizer(store: Arc<MemoryStore>) -> Arc<PoolSynchronizer<MemoryStore>> {
        Arc::new(PoolSynchronizer::new(store, Arc::new(DrawConfig::default())))
    }

    #[tokio::test]
    async fn sync_derives_pool_and_rereads_prize() {
        let store = seeded_store(&["a", "b", "c"], "p1", 2);
        let sync = synchronizer(Arc::clone(&store));

        let snap = sync.sync(Some("p1")).await.unwrap();
        assert_eq!(snap.attendees.len(), 3);
        assert_eq!(snap.prize.as_ref().unwrap().remaining, 2);
    }

    #[tokio::test]
    async fn sync_is_idempotent_without_intervening_writes() {
        let store = seeded_store(&["a", "b"], "p1", 1);
        let sync = synchronizer(store);

        let first = sync.sync(Some("p1")).await.unwrap();
        let second = sync.sync(Some("p1")).await.unwrap();
        assert_eq!(first.attendees, second.attendees);
        assert_eq!(first.prize, second.prize);
    }

    #[tokio::test]
    async fn ineligible_attendee_never_reenters_the_pool() {
        let store = seeded_store(&["a", "b"], "p1", 1);
        let sync = synchronizer(Arc::clone(&store));

        store
            .atomic_batch_write(vec![BatchOp::update(
                "attendees",
                "a",
                [(fields::IS_ELIGIBLE.to_string(), json!(false))]
                    .into_iter()
                    .collect(),
            )])
            .await
            .unwrap();

        let snap = sync.sync(None).await.unwrap();
        assert!(snap.attendees.iter().all(|a| a.id != "a"));

        // Even a direct re-check-in style update cannot resurrect them
        // while isEligible stays false.
        store.seed(
            "attendees",
            vec![("a".into(), {
                let mut doc = attendee_doc("a");
                doc[fields::IS_ELIGIBLE] = json!(false);
                doc
            })],
        );
        let snap = sync.sync(None).await.unwrap();
        assert!(snap.attendees.iter().all(|a| a.id != "a"));
    }

    #[tokio::test]
    async fn feed_republishes_on_winner_insert() {
        let store = seeded_store(&["a", "b"], "p1", 1);
        let sync = synchronizer(Arc::clone(&store));
        let (mut rx, token) = sync.spawn_feed(Some("p1".to_string()));

        // Wait for the initial publication.
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().attendees.len(), 2);

        // A winner record appearing shrinks the pool.
        store.seed(
            "winners",
            vec![(
                "w1".into(),
                json!({"id": "w1", "attendeeId": "a", "attendeeName": "A",
                       "prizeId": "p1", "prizeName": "P", "prizeTier": "Minor",
                       "timestamp": 5, "committedAt": "2026-01-01T00:00:00Z",
                       "claimed": false}),
            )],
        );
        rx.changed().await.unwrap();
        let snap = rx.borrow().clone();
        assert_eq!(snap.attendees.len(), 1);
        assert_eq!(snap.attendees[0].id, "b");

        token.cancel();
    }

    /// A store double whose reads fail on demand, for exercising the
    /// keep-previous-state contract.
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), StoreError> {
            if self.fail_reads.load(std::sync::atomic::Ordering::Relaxed) {
                Err(StoreError::Backend("injected read failure".into()))
            } else {
                Ok(())
            }
        }
    }

    impl DocumentStore for FlakyStore {
        async fn get_document(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<Value>, StoreError> {
            self.check()?;
            self.inner.get_document(collection, id).await
        }

        async fn query_documents(
            &self,
            collection: &str,
            predicates: &[Predicate],
        ) -> Result<Vec<Value>, StoreError> {
            self.check()?;
            self.inner.query_documents(collection, predicates).await
        }

        fn subscribe(
            &self,
            collection: &str,
            predicates: Vec<Predicate>,
        ) -> mpsc::UnboundedReceiver<ChangeEvent> {
            self.inner.subscribe(collection, predicates)
        }

        async fn atomic_batch_write(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
            self.inner.atomic_batch_write(ops).await
        }

        fn server_timestamp(&self) -> u64 {
            self.inner.server_timestamp()
        }
    }

    #[tokio::test]
    async fn read_failure_keeps_previous_snapshot() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_reads: std::sync::atomic::AtomicBool::new(false),
        });
        flaky
            .inner
            .seed("attendees", vec![("a".into(), attendee_doc("a"))]);
        flaky.inner.seed("prizes", vec![("p1".into(), prize_doc("p1", 1))]);

        let sync = Arc::new(PoolSynchronizer::new(
            Arc::clone(&flaky),
            Arc::new(DrawConfig::default()),
        ));
        sync.sync(Some("p1")).await.unwrap();

        flaky
            .fail_reads
            .store(true, std::sync::atomic::Ordering::Relaxed);
        let err = sync.sync(Some("p1")).await.unwrap_err();
        assert!(matches!(err, DrawError::SyncReadFailure(_)));

        let cached = sync.cached();
        assert_eq!(cached.attendees.len(), 1);
        assert_eq!(cached.prize.as_ref().unwrap().id, "p1");
    }
}
