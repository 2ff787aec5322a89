//! Revision session identity.

use serde::{Deserialize, Serialize};

use crate::types::{CountType, LocationId, RevisionId};

/// One physical count at one location.
///
/// Passed explicitly into every service call; nothing captures it ambiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSession {
    /// Unique revision number.
    pub revision_id: RevisionId,
    /// Location being counted.
    pub location_id: LocationId,
    /// Count classifier.
    pub count_type: CountType,
    /// True when lines carry variant attributes.
    #[serde(default)]
    pub track_variants: bool,
}

/// Parameters for starting a new count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRevision {
    /// Location to count.
    pub location_id: LocationId,
    /// Count classifier.
    pub count_type: CountType,
    /// Whether lines carry variant attributes.
    pub track_variants: bool,
}
