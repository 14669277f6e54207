//! # Winner Ledger
//!
//! Read/claim helpers over committed winner records, backing the public
//! transparency page and the prize-desk "collected" flow.

use serde_json::json;
use std::sync::Arc;

use crate::config::DrawConfig;
use crate::errors::{DrawError, StoreError};
use crate::models::{self, fields, Prize, PrizeTier, WinnerRecord};
use crate::store::{BatchOp, DocumentStore};

pub struct WinnerLedger<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<DrawConfig>,
}

impl<S: DocumentStore> WinnerLedger<S> {
    pub fn new(store: Arc<S>, config: Arc<DrawConfig>) -> Self {
        Self { store, config }
    }

    /// All committed winner records, newest first (store-assigned
    /// sequence order, not client clocks).
    pub async fn history(&self) -> Result<Vec<WinnerRecord>, DrawError> {
        let docs = self
            .store
            .query_documents(&self.config.collections.winners, &[])
            .await?;
        let mut records: Vec<WinnerRecord> = docs
            .into_iter()
            .map(models::from_doc)
            .collect::<Result<_, _>>()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Marks a record as claimed at the prize desk. Claiming twice is a
    /// conflict, so two desk operators cannot both hand out the prize.
    pub async fn claim(&self, record_id: &str) -> Result<(), DrawError> {
        let op = BatchOp::update_if(
            &self.config.collections.winners,
            record_id,
            [(fields::CLAIMED.to_string(), json!(true))]
                .into_iter()
                .collect(),
            [(fields::CLAIMED.to_string(), json!(false))]
                .into_iter()
                .collect(),
        );
        match self.store.atomic_batch_write(vec![op]).await {
            Ok(()) => Ok(()),
            Err(StoreError::Aborted(reason)) => Err(DrawError::WriteConflict(reason)),
            Err(e) => Err(e.into()),
        }
    }

    /// Prizes of one tier for the operator's picker, optionally limited
    /// to those still in stock.
    pub async fn prizes_by_tier(
        &self,
        tier: PrizeTier,
        in_stock_only: bool,
    ) -> Result<Vec<Prize>, DrawError> {
        let docs = self
            .store
            .query_documents(
                &self.config.collections.prizes,
                &[crate::store::Predicate::eq("tier", json!(tier))],
            )
            .await?;
        let prizes: Vec<Prize> = docs
            .into_iter()
            .map(models::from_doc)
            .collect::<Result<_, _>>()?;
        Ok(prizes
            .into_iter()
            .filter(|p| !in_stock_only || p.in_stock())
            .collect())
    }
}
