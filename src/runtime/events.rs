//! Runtime event stream payloads.

use crate::{
    engine::reconcile::ComparisonTotals,
    types::{ItemId, Quantity, RevisionId},
};

/// Events emitted from the single-owner runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionEvent {
    /// A session entered collection mode.
    Opened {
        /// Opened revision.
        revision_id: RevisionId,
    },
    /// The store was replaced by a bulk load.
    Loaded {
        /// Number of lines loaded.
        items: usize,
    },
    /// Lines were added by search or manual entry.
    ItemsAdded {
        /// Added line ids.
        ids: Vec<ItemId>,
    },
    /// A confirmed quantity was applied locally.
    QuantityChanged {
        /// Edited line.
        id: ItemId,
        /// New counted quantity.
        quantity: Quantity,
    },
    /// Background sync of a quantity failed. The local value stands.
    QuantitySyncFailed {
        /// Edited line.
        id: ItemId,
        /// Quantity the backend did not acknowledge.
        quantity: Quantity,
        /// Rendered service error.
        error: String,
    },
    /// A later sync of a previously unsynced line succeeded.
    QuantitySyncRecovered {
        /// Recovered line.
        id: ItemId,
    },
    /// A line was removed.
    ItemRemoved {
        /// Removed line.
        id: ItemId,
        /// Whether a remove call was sent to the backend.
        server_tracked: bool,
    },
    /// A comparison was computed.
    Compared {
        /// Recounted aggregates.
        totals: ComparisonTotals,
    },
    /// The comparison was discarded.
    ReturnedToEdit,
    /// A comment was attached.
    Annotated {
        /// Explicit target count, `None` for all mismatched lines.
        targets: Option<usize>,
    },
    /// The revision was posted to the ledger.
    Finalized {
        /// Finalized revision.
        revision_id: RevisionId,
    },
    /// The revision was deleted.
    Deleted {
        /// Deleted revision.
        revision_id: RevisionId,
    },
}
