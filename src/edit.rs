//! Journaled quantity edits whose optimistic sync failed.

use serde::{Deserialize, Serialize};

use crate::types::{EditSeq, ItemId, Quantity, RevisionId};

/// Version number for serialized [`UnsyncedEditEnvelope`] payloads.
pub const EDIT_FORMAT_VERSION: u16 = 1;

/// A quantity the operator confirmed locally that the backend never acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsyncedEdit {
    /// Revision the line belongs to.
    pub revision_id: RevisionId,
    /// Line whose quantity diverged.
    pub item_id: ItemId,
    /// Locally confirmed quantity.
    pub quantity: Quantity,
    /// Error reported by the failed sync.
    pub error: String,
}

/// Journal row metadata plus edit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEdit {
    /// Monotonic journal sequence.
    pub seq: EditSeq,
    /// Failure timestamp in milliseconds.
    pub ts_ms: u64,
    /// Edit body.
    pub edit: UnsyncedEdit,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsyncedEditEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped edit.
    pub edit: UnsyncedEdit,
}

impl UnsyncedEditEnvelope {
    /// Constructs an envelope using [`EDIT_FORMAT_VERSION`].
    pub fn new(edit: UnsyncedEdit) -> Self {
        Self {
            format_version: EDIT_FORMAT_VERSION,
            edit,
        }
    }
}
