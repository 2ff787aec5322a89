use std::collections::BTreeSet;

use crate::{
    engine::{
        machine::{PhaseKind, RevisionMachine},
        reconcile::{ComparisonResult, ComparisonTotals, Origin},
    },
    export::{self, ExportError},
    item::RevisionItem,
    session::RevisionSession,
    types::{Delta, ItemId, ViewFilter},
};

/// Comparison part of a [`SessionView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonView {
    pub result: ComparisonResult,
    pub filter: ViewFilter,
    pub selection: BTreeSet<ItemId>,
}

/// One displayed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub item: RevisionItem,
    /// Present only while comparing.
    pub delta: Option<Delta>,
    pub origin: Option<Origin>,
    pub unsynced: bool,
}

/// Read-only snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: PhaseKind,
    pub session: Option<RevisionSession>,
    pub items: Vec<RevisionItem>,
    pub comparison: Option<ComparisonView>,
    pub busy: bool,
    pub unsynced: BTreeSet<ItemId>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            phase: PhaseKind::NoSession,
            session: None,
            items: Vec::new(),
            comparison: None,
            busy: false,
            unsynced: BTreeSet::new(),
        }
    }
}

impl SessionView {
    pub(crate) fn capture(machine: &RevisionMachine, unsynced: &BTreeSet<ItemId>, busy: bool) -> Self {
        Self {
            phase: machine.phase_kind(),
            session: machine.session().cloned(),
            items: machine.store().list_cloned(),
            comparison: machine.comparison().map(|c| ComparisonView {
                result: c.result.clone(),
                filter: c.filter,
                selection: c.selection.clone(),
            }),
            busy,
            unsynced: unsynced.clone(),
        }
    }

    pub fn totals(&self) -> Option<ComparisonTotals> {
        self.comparison.as_ref().map(|c| c.result.totals())
    }

    /// Lines as currently displayed: the store while collecting, the
    /// filtered comparison while comparing.
    pub fn rows(&self) -> Vec<ViewRow> {
        match &self.comparison {
            Some(cmp) => cmp
                .result
                .visible(cmp.filter)
                .into_iter()
                .map(|c| ViewRow {
                    item: c.item.clone(),
                    delta: Some(c.delta),
                    origin: Some(c.origin),
                    unsynced: self.unsynced.contains(&c.item.id),
                })
                .collect(),
            None => self
                .items
                .iter()
                .map(|item| ViewRow {
                    item: item.clone(),
                    delta: None,
                    origin: None,
                    unsynced: self.unsynced.contains(&item.id),
                })
                .collect(),
        }
    }

    /// Writes [`Self::rows`] as CSV.
    pub fn export_csv<W: std::io::Write>(&self, writer: W) -> Result<(), ExportError> {
        export::write_csv(&self.rows(), writer)
    }
}
