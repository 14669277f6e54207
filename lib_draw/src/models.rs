//! # Raffle Data Model
//!
//! The typed documents moved through the store contract, plus the single
//! authoritative derivation of the eligible attendee pool.
//!
//! Documents are serialized with camelCase field names, matching the wire
//! shape the surrounding event application stores them in. All correctness
//! decisions (stock checks, duplicate-winner prevention) are made against
//! freshly read instances of these types, never against cached copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::errors::DrawError;

/// Collection/field name constants shared by the synchronizer and the
/// coordinators, so update maps and compare-and-set preconditions cannot
/// drift from the serialized shape.
pub mod fields {
    /// Attendee eligibility flag.
    pub const IS_ELIGIBLE: &str = "isEligible";
    /// Attendee check-in flag.
    pub const CHECKED_IN: &str = "checkedIn";
    /// Prize remaining-stock counter.
    pub const REMAINING: &str = "remaining";
    /// Winner record attendee reference.
    pub const ATTENDEE_ID: &str = "attendeeId";
    /// Winner record claim flag.
    pub const CLAIMED: &str = "claimed";
}

/// A checked-in event attendee, as stored by the (out-of-scope) check-in
/// subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub avatar: String,
    /// Set true exactly once by check-in. Never mutated here.
    #[serde(default)]
    pub checked_in: bool,
    /// Starts true; flipped permanently false by a committed win or a
    /// redraw disqualification. Never flipped back.
    #[serde(default = "default_true")]
    pub is_eligible: bool,
}

fn default_true() -> bool {
    true
}

/// Prize tier shown on the operator's picker and the transparency page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrizeTier {
    Grand,
    Major,
    Minor,
}

/// A raffle prize. Invariant: `0 <= remaining <= quantity`, and
/// `remaining` only ever decreases, by exactly the size of a committed
/// winner batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prize {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: PrizeTier,
    pub quantity: u32,
    pub remaining: u32,
}

impl Prize {
    /// Whether at least one unit is still available.
    pub fn in_stock(&self) -> bool {
        self.remaining > 0
    }
}

/// The persisted outcome of a confirmed draw.
///
/// Attendee and prize fields are denormalized at commit time so the public
/// history stays stable even if the source records are later edited or
/// removed. The existence of a record is the sole authoritative signal
/// that an attendee won; deleting it (redraw) signals "did not ultimately
/// win" while `is_eligible` stays false on the attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub id: String,
    pub attendee_id: String,
    pub attendee_name: String,
    #[serde(default)]
    pub attendee_organization: String,
    pub prize_id: String,
    pub prize_name: String,
    pub prize_tier: PrizeTier,
    /// Store-assigned monotonic sequence, used for history ordering.
    pub timestamp: u64,
    /// Wall-clock commit time, for display only.
    pub committed_at: DateTime<Utc>,
    #[serde(default)]
    pub claimed: bool,
}

/// Computes the eligible pool from its three inputs:
/// checked-in attendees, intersected with `is_eligible`, minus every
/// attendee referenced by any winner record.
///
/// This is the only implementation of the derivation; every call site
/// (pull sync, push recompute, post-commit refresh) goes through it.
pub fn derive_eligible_pool(attendees: &[Attendee], winners: &[WinnerRecord]) -> Vec<Attendee> {
    let won: HashSet<&str> = winners.iter().map(|w| w.attendee_id.as_str()).collect();
    attendees
        .iter()
        .filter(|a| a.checked_in && a.is_eligible && !won.contains(a.id.as_str()))
        .cloned()
        .collect()
}

/// Serializes a model into the store's document shape.
pub fn to_doc<T: Serialize>(value: &T) -> Result<Value, DrawError> {
    serde_json::to_value(value).map_err(|e| DrawError::SyncReadFailure(e.to_string()))
}

/// Deserializes a store document into a typed model.
pub fn from_doc<T: for<'de> Deserialize<'de>>(doc: Value) -> Result<T, DrawError> {
    serde_json::from_value(doc).map_err(|e| DrawError::SyncReadFailure(e.to_string()))
}
