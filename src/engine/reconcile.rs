use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::{
    item::RevisionItem,
    types::{Delta, ItemId, ViewFilter},
};

/// One line of a server comparison, before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerComparedItem {
    pub item: RevisionItem,
    /// Server-computed discrepancy, when the server sent one.
    pub delta: Option<Delta>,
}

/// Normalized comparison response: the union of whatever sets the server
/// returned. Aggregate counters are never carried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComparisonPayload {
    pub items: Vec<ServerComparedItem>,
}

/// Where a merged line's delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Present in the server comparison.
    FromServer,
    /// Held locally, absent from the server comparison, delta computed here.
    CarriedForward,
}

/// A merged line with its final delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedItem {
    pub item: RevisionItem,
    pub delta: Delta,
    pub origin: Origin,
}

impl ComparedItem {
    /// Whether counted and system quantities agree.
    pub fn is_matched(&self) -> bool {
        self.delta == 0
    }
}

/// Line counts of a comparison, always recounted from the merged lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComparisonTotals {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
}

/// Partition of merged lines into matched and mismatched sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComparisonResult {
    matched: Vec<ComparedItem>,
    mismatched: Vec<ComparedItem>,
    totals: ComparisonTotals,
}

impl ComparisonResult {
    /// Partitions `entries` by delta and counts each side.
    pub fn from_entries(entries: Vec<ComparedItem>) -> Self {
        let (matched, mismatched): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(ComparedItem::is_matched);
        let totals = ComparisonTotals {
            total: matched.len() + mismatched.len(),
            matched: matched.len(),
            mismatched: mismatched.len(),
        };
        Self {
            matched,
            mismatched,
            totals,
        }
    }

    /// Lines with a zero delta.
    pub fn matched(&self) -> &[ComparedItem] {
        &self.matched
    }

    /// Lines with a non-zero delta.
    pub fn mismatched(&self) -> &[ComparedItem] {
        &self.mismatched
    }

    /// Counts of both partitions.
    pub fn totals(&self) -> ComparisonTotals {
        self.totals
    }

    /// The merged line with identity `id`.
    pub fn get(&self, id: ItemId) -> Option<&ComparedItem> {
        self.matched
            .iter()
            .chain(self.mismatched.iter())
            .find(|c| c.item.id == id)
    }

    /// Lines selected by `filter`; matched lines first under [`ViewFilter::All`].
    pub fn visible(&self, filter: ViewFilter) -> Vec<&ComparedItem> {
        match filter {
            ViewFilter::All => self.matched.iter().chain(self.mismatched.iter()).collect(),
            ViewFilter::Matched => self.matched.iter().collect(),
            ViewFilter::Mismatched => self.mismatched.iter().collect(),
        }
    }

    /// Identities of every mismatched line.
    pub fn mismatched_ids(&self) -> Vec<ItemId> {
        self.mismatched.iter().map(|c| c.item.id).collect()
    }

    /// A new result without line `id`, recounted.
    pub fn without(&self, id: ItemId) -> Self {
        let entries = self
            .matched
            .iter()
            .chain(self.mismatched.iter())
            .filter(|c| c.item.id != id)
            .cloned()
            .collect();
        Self::from_entries(entries)
    }
}

/// Merges a server comparison with the lines held locally before the request.
///
/// Server lines keep the server delta when one was sent, otherwise it is
/// computed from the line. Local lines the server omitted are carried
/// forward with a locally computed delta. Totals are always recounted.
pub fn reconcile(local: &[RevisionItem], payload: ComparisonPayload) -> ComparisonResult {
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(payload.items.len());
    let mut entries = Vec::with_capacity(payload.items.len().max(local.len()));

    for ServerComparedItem { item, delta } in payload.items {
        if !seen.insert(item.id) {
            tracing::warn!(item_id = item.id, "duplicate line in comparison response dropped");
            continue;
        }
        let delta = delta.unwrap_or_else(|| item.delta());
        entries.push(ComparedItem {
            item,
            delta,
            origin: Origin::FromServer,
        });
    }

    let mut carried = 0usize;
    for item in local {
        if seen.contains(&item.id) {
            continue;
        }
        seen.insert(item.id);
        carried += 1;
        entries.push(ComparedItem {
            item: item.clone(),
            delta: item.delta(),
            origin: Origin::CarriedForward,
        });
    }

    if carried > 0 {
        tracing::debug!(carried, "local lines carried into comparison");
    }

    ComparisonResult::from_entries(entries)
}
