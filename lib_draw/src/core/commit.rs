//! # Commit Coordinator
//!
//! Persists a revealed winner batch as one atomic unit: winner records,
//! attendee ineligibility flips and the prize stock decrement all land
//! together or not at all.
//!
//! Stock is re-validated against a fresh read immediately before every
//! write attempt, never against the snapshot the draw was made from, and
//! the decrement itself is guarded by a compare-and-set on the observed
//! `remaining`. Two operators racing for the last unit therefore resolve
//! deterministically: one batch applies, the other aborts, re-reads and
//! reports out-of-stock.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DrawConfig;
use crate::errors::{DrawError, StoreError};
use crate::models::{self, fields, Attendee, Prize, WinnerRecord};
use crate::store::{BatchOp, DocumentStore};

pub struct CommitCoordinator<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<DrawConfig>,
}

impl<S: DocumentStore> CommitCoordinator<S> {
    pub fn new(store: Arc<S>, config: Arc<DrawConfig>) -> Self {
        Self { store, config }
    }

    /// Commits a batch against a prize. Returns the created records.
    ///
    /// Fails with `OutOfStock` (zero writes) when the fresh stock check
    /// cannot cover the batch, and with `WriteConflict` when the guarded
    /// write keeps losing races past the configured retry bound.
    pub async fn commit(
        &self,
        batch: &[Attendee],
        prize_id: &str,
    ) -> Result<Vec<WinnerRecord>, DrawError> {
        if batch.is_empty() {
            return Err(DrawError::EmptyPoolOrOutOfStock);
        }
        let colls = &self.config.collections;
        let needed = batch.len() as u32;

        for attempt in 0..=self.config.commit_retry_limit {
            // Fresh authoritative read; the draw-time snapshot carries no
            // authority here.
            let prize: Prize = self
                .store
                .get_document(&colls.prizes, prize_id)
                .await?
                .map(models::from_doc)
                .transpose()?
                .ok_or_else(|| {
                    DrawError::SyncReadFailure(format!("prize '{}' no longer exists", prize_id))
                })?;

            if prize.remaining < needed {
                log::warn!(
                    "Commit refused: prize '{}' has {} remaining, batch needs {}",
                    prize_id,
                    prize.remaining,
                    needed
                );
                return Err(DrawError::OutOfStock {
                    remaining: prize.remaining,
                    needed,
                });
            }

            let records = self.build_records(batch, &prize)?;
            let ops = self.build_ops(batch, &prize, &records, needed)?;

            match self.store.atomic_batch_write(ops).await {
                Ok(()) => {
                    log::info!(
                        "Committed {} winner(s) for prize '{}' ({} -> {} remaining)",
                        needed,
                        prize_id,
                        prize.remaining,
                        prize.remaining - needed
                    );
                    return Ok(records);
                }
                Err(StoreError::Aborted(reason)) => {
                    // Lost a race; loop back to a fresh read and
                    // re-validate.
                    log::warn!(
                        "Commit attempt {} aborted ({}); revalidating",
                        attempt + 1,
                        reason
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DrawError::WriteConflict(format!(
            "commit kept losing write races after {} attempts",
            self.config.commit_retry_limit + 1
        )))
    }

    /// Denormalizes attendee and prize fields into fresh winner records,
    /// stamped with the store's monotonic sequence.
    fn build_records(
        &self,
        batch: &[Attendee],
        prize: &Prize,
    ) -> Result<Vec<WinnerRecord>, DrawError> {
        Ok(batch
            .iter()
            .map(|attendee| WinnerRecord {
                id: Uuid::new_v4().to_string(),
                attendee_id: attendee.id.clone(),
                attendee_name: attendee.name.clone(),
                attendee_organization: attendee.organization.clone(),
                prize_id: prize.id.clone(),
                prize_name: prize.name.clone(),
                prize_tier: prize.tier,
                timestamp: self.store.server_timestamp(),
                committed_at: Utc::now(),
                claimed: false,
            })
            .collect())
    }

    fn build_ops(
        &self,
        batch: &[Attendee],
        prize: &Prize,
        records: &[WinnerRecord],
        needed: u32,
    ) -> Result<Vec<BatchOp>, DrawError> {
        let colls = &self.config.collections;
        let mut ops = Vec::with_capacity(batch.len() * 2 + 1);

        for record in records {
            ops.push(BatchOp::create(
                &colls.winners,
                &record.id,
                models::to_doc(record)?,
            ));
        }

        for attendee in batch {
            // The eligibility guard doubles as duplicate-winner
            // protection: a member committed by another operator since
            // the draw aborts the whole batch.
            ops.push(BatchOp::update_if(
                &colls.attendees,
                &attendee.id,
                [(fields::IS_ELIGIBLE.to_string(), json!(false))]
                    .into_iter()
                    .collect(),
                [(fields::IS_ELIGIBLE.to_string(), json!(true))]
                    .into_iter()
                    .collect(),
            ));
        }

        ops.push(BatchOp::update_if(
            &colls.prizes,
            &prize.id,
            [(fields::REMAINING.to_string(), json!(prize.remaining - needed))]
                .into_iter()
                .collect(),
            [(fields::REMAINING.to_string(), json!(prize.remaining))]
                .into_iter()
                .collect(),
        ));

        Ok(ops)
    }
}
