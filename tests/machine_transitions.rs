use std::collections::BTreeSet;

use stockcount::{
    core::store::StoreError,
    engine::{
        acquisition::SearchOutcome,
        annotation::{AnnotationTarget, ResolvedTarget},
        machine::{EngineError, PhaseKind, RevisionMachine, ValidationError},
        reconcile::{ComparisonPayload, Origin, ServerComparedItem},
    },
    item::RevisionItem,
    session::RevisionSession,
    types::{CountType, ItemId, ViewFilter},
};

fn session() -> RevisionSession {
    RevisionSession {
        revision_id: 11,
        location_id: 3,
        count_type: CountType::ByBrand,
        track_variants: false,
    }
}

fn line(id: ItemId, counted: u64, system: i64) -> RevisionItem {
    RevisionItem::new(id, format!("item {id}"), format!("C{id}"), counted, system)
}

fn collecting(items: Vec<RevisionItem>) -> RevisionMachine {
    let mut m = RevisionMachine::new();
    m.open(session(), items).expect("open");
    m
}

fn comparing(items: Vec<RevisionItem>, payload: ComparisonPayload) -> RevisionMachine {
    let mut m = collecting(items);
    let snapshot = m.compare_snapshot().expect("snapshot");
    m.complete_compare(&snapshot, payload).expect("compare");
    m
}

#[test]
fn operations_require_an_open_session() {
    let mut m = RevisionMachine::new();
    assert_eq!(m.phase_kind(), PhaseKind::NoSession);
    assert_eq!(m.merge_search(vec![line(1, 1, 1)]), Err(EngineError::NoSession));
    assert_eq!(m.set_quantity(1, 2), Err(EngineError::NoSession));
    assert_eq!(m.back_to_edit(), Err(EngineError::NoSession));
}

#[test]
fn second_open_is_rejected() {
    let mut m = collecting(vec![]);
    assert_eq!(m.open(session(), vec![]), Err(EngineError::SessionOpen));
}

#[test]
fn search_then_search_again_leaves_store_unchanged() {
    let mut m = collecting(vec![line(1, 1, 1)]);
    let first = m.merge_search(vec![line(2, 1, 1)]).expect("merge");
    assert_eq!(first, SearchOutcome::Added(vec![2]));

    let again = m.merge_search(vec![line(2, 1, 1)]).expect("merge");
    assert_eq!(again, SearchOutcome::AlreadyPresent(vec![2]));
    assert_eq!(m.store().ordered_ids(), &[2, 1]);
}

#[test]
fn empty_search_result_is_not_found() {
    let mut m = collecting(vec![line(1, 1, 1)]);
    assert_eq!(m.merge_search(vec![]), Ok(SearchOutcome::NotFound));
    assert_eq!(m.store().len(), 1);
}

#[test]
fn collecting_only_operations_fail_while_comparing() {
    let mut m = comparing(vec![line(1, 1, 1)], ComparisonPayload::default());
    assert_eq!(m.phase_kind(), PhaseKind::Comparing);
    assert_eq!(m.set_quantity(1, 5), Err(EngineError::NotCollecting));
    assert_eq!(m.merge_search(vec![]), Err(EngineError::NotCollecting));
    assert_eq!(m.store().get(1).map(|r| r.counted()), Some(1));
}

#[test]
fn comparing_then_back_to_edit_returns_to_collecting() {
    let mut m = comparing(vec![line(1, 1, 1)], ComparisonPayload::default());
    m.back_to_edit().expect("back");
    assert_eq!(m.phase_kind(), PhaseKind::Collecting);
    assert!(m.comparison().is_none());
    m.apply_bulk_load(vec![line(5, 2, 2)]).expect("load");
    assert_eq!(m.store().ordered_ids(), &[5]);
}

#[test]
fn recompute_keeps_filter_and_clears_selection() {
    let mut m = comparing(vec![line(1, 1, 1), line(2, 3, 1)], ComparisonPayload::default());
    m.set_filter(ViewFilter::Mismatched).expect("filter");
    assert_eq!(m.toggle_selection(2), Ok(true));

    let snapshot = m.compare_snapshot().expect("snapshot");
    m.complete_compare(&snapshot, ComparisonPayload::default()).expect("recompute");

    let cmp = m.comparison().expect("comparison");
    assert_eq!(cmp.filter, ViewFilter::Mismatched);
    assert!(cmp.selection.is_empty());
}

#[test]
fn toggling_unknown_line_is_rejected() {
    let mut m = comparing(vec![line(1, 1, 1)], ComparisonPayload::default());
    assert_eq!(m.toggle_selection(99), Err(EngineError::Store(StoreError::MissingItem(99))));
    assert_eq!(m.toggle_selection(1), Ok(true));
    assert_eq!(m.toggle_selection(1), Ok(false));
}

#[test]
fn annotation_resolves_selection_and_rejects_empty_input() {
    let mut m = comparing(vec![line(1, 1, 2), line(2, 3, 1)], ComparisonPayload::default());
    assert_eq!(
        m.prepare_annotation("  ", AnnotationTarget::AllMismatched),
        Err(EngineError::Validation(ValidationError::EmptyComment))
    );
    assert_eq!(
        m.prepare_annotation("damaged", AnnotationTarget::Selection),
        Err(EngineError::Validation(ValidationError::NoTargets))
    );

    m.toggle_selection(2).expect("select");
    let ann = m
        .prepare_annotation(" damaged ", AnnotationTarget::Selection)
        .expect("annotation");
    assert_eq!(ann.comment, "damaged");
    assert_eq!(ann.target, ResolvedTarget::Items(vec![2]));

    let explicit = m
        .prepare_annotation("x", AnnotationTarget::Items(BTreeSet::from([1, 2])))
        .expect("explicit");
    assert_eq!(explicit.explicit_len(), Some(2));
}

#[test]
fn removing_carried_forward_line_is_local_only() {
    let payload = ComparisonPayload {
        items: vec![ServerComparedItem {
            item: line(1, 1, 1),
            delta: None,
        }],
    };
    let mut m = comparing(vec![line(1, 1, 1), line(2, 4, 1)], payload);
    assert_eq!(
        m.comparison().and_then(|c| c.result.get(2)).map(|c| c.origin),
        Some(Origin::CarriedForward)
    );
    assert_eq!(m.is_server_tracked(2), Ok(false));
    assert_eq!(m.is_server_tracked(1), Ok(true));

    let removal = m.remove(2).expect("remove");
    assert!(!removal.server_tracked);
    let totals = m.comparison().map(|c| c.result.totals()).expect("totals");
    assert_eq!(totals.total, 1);
    assert_eq!(totals.mismatched, 0);
}

#[test]
fn finalized_revision_rejects_further_operations() {
    let mut m = comparing(vec![line(1, 1, 1)], ComparisonPayload::default());
    m.mark_finalized().expect("finalize");
    assert_eq!(m.phase_kind(), PhaseKind::Finalized);
    assert_eq!(m.back_to_edit(), Err(EngineError::Finalized(11)));
    assert_eq!(m.remove(1).map(|_| ()), Err(EngineError::Finalized(11)));
    assert_eq!(m.mark_finalized(), Err(EngineError::Finalized(11)));
}

#[test]
fn delete_tears_down_session() {
    let mut m = collecting(vec![line(1, 1, 1)]);
    m.mark_deleted().expect("delete");
    assert_eq!(m.phase_kind(), PhaseKind::NoSession);
    assert!(m.store().is_empty());
    m.open(session(), vec![]).expect("reopen");
}

#[test]
fn remove_product_drops_linked_lines() {
    let mut m = collecting(vec![
        line(1, 1, 1).with_product(7),
        line(2, 1, 1).with_product(7),
        line(3, 1, 1).with_product(8),
    ]);
    let removed = m.remove_product(7).expect("remove product");
    assert_eq!(removed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(m.store().ordered_ids(), &[3]);
}

#[test]
fn manual_line_for_counted_item_is_rejected_before_commit() {
    let mut m = collecting(vec![line(40, 3, 2)]);
    assert_eq!(
        m.ensure_new_line(40),
        Err(EngineError::Store(StoreError::AlreadyExists(40)))
    );
    assert_eq!(
        m.commit_manual(line(40, 1, 8)),
        Err(EngineError::Store(StoreError::AlreadyExists(40)))
    );
    let kept = m.store().get(40).expect("line");
    assert_eq!((kept.counted(), kept.system), (3, 2));

    m.ensure_new_line(41).expect("new line");
    m.commit_manual(line(41, 1, 8)).expect("commit");
    assert_eq!(m.store().ordered_ids(), &[41, 40]);
}
