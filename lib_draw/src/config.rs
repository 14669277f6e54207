//! # Engine Configuration
//!
//! Runtime options for the raffle engine, deserializable from a JSON5
//! document (the same format the rest of the deployment's config files
//! use). Every field has a default, so an empty `{}` is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::DrawError;

/// Store collection names. Overridable so staging deployments can point
/// the engine at prefixed collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub attendees: String,
    pub prizes: String,
    pub winners: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            attendees: "attendees".to_string(),
            prizes: "prizes".to_string(),
            winners: "winners".to_string(),
        }
    }
}

/// Options controlling the draw workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Collection names in the backing store.
    pub collections: Collections,
    /// Milliseconds the reveal animation runs before a drawn winner is
    /// shown. The winner is fixed before this delay starts.
    pub reveal_duration_ms: u64,
    /// Number of display names in the operator-facing shuffle sequence
    /// (the true winner's name is always the last entry).
    pub reveal_sequence_len: usize,
    /// How many times a commit re-reads and retries after losing a
    /// compare-and-set race before giving up with a write conflict.
    pub commit_retry_limit: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            collections: Collections::default(),
            reveal_duration_ms: 3000,
            reveal_sequence_len: 20,
            commit_retry_limit: 3,
        }
    }
}

impl DrawConfig {
    /// Parses a configuration from a JSON5 document.
    pub fn from_json5(text: &str) -> Result<Self, DrawError> {
        json5::from_str(text).map_err(|e| DrawError::InvalidConfig(e.to_string()))
    }

    /// The reveal animation duration as a `Duration`.
    pub fn reveal_duration(&self) -> Duration {
        Duration::from_millis(self.reveal_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = DrawConfig::from_json5("{}").unwrap();
        assert_eq!(cfg.reveal_duration_ms, 3000);
        assert_eq!(cfg.collections.attendees, "attendees");
        assert_eq!(cfg.commit_retry_limit, 3);
    }

    #[test]
    fn json5_overrides_apply() {
        let cfg = DrawConfig::from_json5(
            r#"{
                // staging collections are prefixed
                collections: { attendees: "stg_attendees" },
                reveal_duration_ms: 100,
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.collections.attendees, "stg_attendees");
        assert_eq!(cfg.collections.prizes, "prizes");
        assert_eq!(cfg.reveal_duration(), Duration::from_millis(100));
    }
}
