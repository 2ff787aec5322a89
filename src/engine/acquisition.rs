//! Merge rules for search results and construction of manual lines.

use crate::{
    core::store::RevisionItemStore,
    item::{RevisionItem, StockCandidate},
    types::{ItemId, Quantity, SystemQuantity},
};

use super::machine::ValidationError;

/// What a search merge did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The service returned no match.
    NotFound,
    /// Every match is already counted; the store is unchanged.
    AlreadyPresent(Vec<ItemId>),
    /// New lines were prepended, in service order.
    Added(Vec<ItemId>),
}

/// Prepends every match not already in `store`.
pub fn merge_search(store: &mut RevisionItemStore, found: Vec<RevisionItem>) -> SearchOutcome {
    if found.is_empty() {
        return SearchOutcome::NotFound;
    }

    let mut present = Vec::new();
    let mut fresh = Vec::new();
    for item in found {
        if store.contains(item.id) || fresh.iter().any(|f: &RevisionItem| f.id == item.id) {
            present.push(item.id);
        } else {
            fresh.push(item);
        }
    }

    if fresh.is_empty() {
        return SearchOutcome::AlreadyPresent(present);
    }

    // prepend in reverse so the first match ends up on top
    let mut added: Vec<ItemId> = Vec::with_capacity(fresh.len());
    for item in fresh.into_iter().rev() {
        let id = item.id;
        match store.prepend(item) {
            Ok(()) => added.push(id),
            Err(err) => tracing::warn!(item_id = id, error = %err, "search hit not added"),
        }
    }
    added.reverse();
    SearchOutcome::Added(added)
}

/// Rejects a blank search query.
pub fn normalize_query(query: &str) -> Result<&str, ValidationError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(trimmed)
}

/// Rejects a zero operator quantity.
pub fn check_manual_quantity(quantity: Quantity) -> Result<(), ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::ZeroQuantity);
    }
    Ok(())
}

/// Builds a manual line from a candidate and a freshly looked-up ledger
/// quantity. The candidate's own `system` field is ignored.
pub fn manual_item(
    candidate: &StockCandidate,
    system: SystemQuantity,
    quantity: Quantity,
) -> Result<RevisionItem, ValidationError> {
    check_manual_quantity(quantity)?;

    let mut item = RevisionItem::new(
        candidate.id,
        candidate.name.clone(),
        candidate.code.clone(),
        quantity,
        system,
    )
    .with_attributes(candidate.attributes.clone());
    item.product_id = candidate.product_id;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: ItemId) -> RevisionItem {
        RevisionItem::new(id, format!("item {id}"), format!("C{id}"), 1, 1)
    }

    #[test]
    fn search_prepends_new_matches_in_order() {
        let mut store = RevisionItemStore::from_items(vec![line(1)]);
        let out = merge_search(&mut store, vec![line(2), line(3)]);
        assert_eq!(out, SearchOutcome::Added(vec![2, 3]));
        assert_eq!(store.ordered_ids(), &[2, 3, 1]);
    }

    #[test]
    fn repeated_hit_is_added_once_in_service_order() {
        let mut store = RevisionItemStore::new();
        let out = merge_search(&mut store, vec![line(4), line(5), line(4), line(6)]);
        assert_eq!(out, SearchOutcome::Added(vec![4, 5, 6]));
        assert_eq!(store.ordered_ids(), &[4, 5, 6]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn blank_query_is_rejected() {
        assert_eq!(normalize_query("   "), Err(ValidationError::EmptyQuery));
        assert_eq!(normalize_query(" 12345 "), Ok("12345"));
    }
}
