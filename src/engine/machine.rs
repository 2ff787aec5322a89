use std::collections::BTreeSet;

use crate::{
    core::store::{RevisionItemStore, StoreError},
    item::RevisionItem,
    session::RevisionSession,
    types::{ItemId, ProductId, Quantity, RevisionId, ViewFilter},
};

use super::{
    acquisition::{self, SearchOutcome},
    annotation::{self, Annotation, AnnotationTarget},
    reconcile::{self, ComparisonPayload, ComparisonResult, ComparisonTotals, Origin},
};

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("comment is empty")]
    EmptyComment,
    #[error("no items selected")]
    NoTargets,
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    #[error("search query is empty")]
    EmptyQuery,
}

/// Errors raised by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no revision session is open")]
    NoSession,
    #[error("a revision session is already open")]
    SessionOpen,
    #[error("operation is only available while collecting items")]
    NotCollecting,
    #[error("operation is only available while comparing")]
    NotComparing,
    #[error("revision {0} is finalized")]
    Finalized(RevisionId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Comparison state: the current result plus view-local filter and selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comparison {
    pub result: ComparisonResult,
    pub filter: ViewFilter,
    pub selection: BTreeSet<ItemId>,
}

/// What an open session is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Lines can be added and edited.
    Collecting,
    /// A reconciliation result is on display; edits are blocked.
    Comparing(Comparison),
}

/// Session lifecycle. The comparison lives inside the phase, so it cannot
/// exist outside comparison mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    NoSession,
    Active {
        session: RevisionSession,
        mode: Mode,
    },
    /// Terminal; the session is kept for display.
    Finalized(RevisionSession),
}

/// Fieldless mirror of [`Phase`] for views and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    NoSession,
    Collecting,
    Comparing,
    Finalized,
}

/// A line removed from the revision, and whether the service still tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub item: RevisionItem,
    pub server_tracked: bool,
}

/// Session state machine over the item store. Performs no I/O: callers run
/// the service call and feed its outcome back in.
#[derive(Debug, Clone)]
pub struct RevisionMachine {
    phase: Phase,
    store: RevisionItemStore,
}

impl Default for RevisionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionMachine {
    /// A machine with no session.
    pub fn new() -> Self {
        Self {
            phase: Phase::NoSession,
            store: RevisionItemStore::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Fieldless kind of the current phase.
    pub fn phase_kind(&self) -> PhaseKind {
        match &self.phase {
            Phase::NoSession => PhaseKind::NoSession,
            Phase::Active {
                mode: Mode::Collecting,
                ..
            } => PhaseKind::Collecting,
            Phase::Active {
                mode: Mode::Comparing(_),
                ..
            } => PhaseKind::Comparing,
            Phase::Finalized(_) => PhaseKind::Finalized,
        }
    }

    /// The open or finalized session, if any.
    pub fn session(&self) -> Option<&RevisionSession> {
        match &self.phase {
            Phase::NoSession => None,
            Phase::Active { session, .. } | Phase::Finalized(session) => Some(session),
        }
    }

    /// Read access to the counted lines.
    pub fn store(&self) -> &RevisionItemStore {
        &self.store
    }

    /// The comparison, only while comparing.
    pub fn comparison(&self) -> Option<&Comparison> {
        match &self.phase {
            Phase::Active {
                mode: Mode::Comparing(cmp),
                ..
            } => Some(cmp),
            _ => None,
        }
    }

    /// Enters collection mode for `session` with a bulk-loaded item set.
    pub fn open(&mut self, session: RevisionSession, items: Vec<RevisionItem>) -> Result<(), EngineError> {
        if matches!(self.phase, Phase::Active { .. }) {
            return Err(EngineError::SessionOpen);
        }
        self.store.replace_all(items);
        tracing::info!(revision_id = session.revision_id, items = self.store.len(), "revision opened");
        self.phase = Phase::Active {
            session,
            mode: Mode::Collecting,
        };
        Ok(())
    }

    /// The session, provided the machine is collecting.
    pub fn require_collecting(&self) -> Result<&RevisionSession, EngineError> {
        match &self.phase {
            Phase::Active {
                session,
                mode: Mode::Collecting,
            } => Ok(session),
            Phase::Active { .. } => Err(EngineError::NotCollecting),
            Phase::Finalized(s) => Err(EngineError::Finalized(s.revision_id)),
            Phase::NoSession => Err(EngineError::NoSession),
        }
    }

    /// The session, provided the machine is comparing.
    pub fn require_comparing(&self) -> Result<&RevisionSession, EngineError> {
        match &self.phase {
            Phase::Active {
                session,
                mode: Mode::Comparing(_),
            } => Ok(session),
            Phase::Active { .. } => Err(EngineError::NotComparing),
            Phase::Finalized(s) => Err(EngineError::Finalized(s.revision_id)),
            Phase::NoSession => Err(EngineError::NoSession),
        }
    }

    /// The session, provided one is open and not finalized.
    pub fn require_active(&self) -> Result<&RevisionSession, EngineError> {
        match &self.phase {
            Phase::Active { session, .. } => Ok(session),
            Phase::Finalized(s) => Err(EngineError::Finalized(s.revision_id)),
            Phase::NoSession => Err(EngineError::NoSession),
        }
    }

    /// Replaces the store wholesale. Only valid while collecting.
    pub fn apply_bulk_load(&mut self, items: Vec<RevisionItem>) -> Result<(), EngineError> {
        self.require_collecting()?;
        self.store.replace_all(items);
        Ok(())
    }

    /// Merges search hits; see [`acquisition::merge_search`].
    pub fn merge_search(&mut self, found: Vec<RevisionItem>) -> Result<SearchOutcome, EngineError> {
        self.require_collecting()?;
        Ok(acquisition::merge_search(&mut self.store, found))
    }

    /// Fails with [`StoreError::AlreadyExists`] when `id` is already counted.
    /// Checked before a manual line is sent to the service.
    pub fn ensure_new_line(&self, id: ItemId) -> Result<(), EngineError> {
        self.require_collecting()?;
        if self.store.contains(id) {
            return Err(StoreError::AlreadyExists(id).into());
        }
        Ok(())
    }

    /// Commits an accepted manual line at the head of the list.
    pub fn commit_manual(&mut self, item: RevisionItem) -> Result<(), EngineError> {
        self.require_collecting()?;
        Ok(self.store.prepend(item)?)
    }

    /// Sets a confirmed quantity; returns the previous one.
    pub fn set_quantity(&mut self, id: ItemId, quantity: Quantity) -> Result<Quantity, EngineError> {
        self.require_collecting()?;
        Ok(self.store.set_quantity(id, quantity)?)
    }

    /// Whether removing `id` needs a backend call.
    pub fn is_server_tracked(&self, id: ItemId) -> Result<bool, EngineError> {
        self.require_active()?;
        if let Some(cmp) = self.comparison() {
            if let Some(c) = cmp.result.get(id) {
                return Ok(c.origin == Origin::FromServer);
            }
        }
        if self.store.contains(id) {
            return Ok(true);
        }
        Err(StoreError::MissingItem(id).into())
    }

    /// Removes one line. While comparing, a carried-forward line is only
    /// known locally and reports `server_tracked: false`.
    pub fn remove(&mut self, id: ItemId) -> Result<Removal, EngineError> {
        self.require_active()?;
        let Phase::Active { mode, .. } = &mut self.phase else {
            return Err(EngineError::NoSession);
        };

        match mode {
            Mode::Collecting => {
                let item = self.store.remove(id)?;
                Ok(Removal {
                    item,
                    server_tracked: true,
                })
            }
            Mode::Comparing(cmp) => {
                let compared = cmp.result.get(id).cloned();
                let local = self.store.remove(id).ok();
                let (item, server_tracked) = match (compared, local) {
                    (Some(c), _) => (c.item, c.origin == Origin::FromServer),
                    (None, Some(item)) => (item, true),
                    (None, None) => return Err(StoreError::MissingItem(id).into()),
                };
                cmp.result = cmp.result.without(id);
                cmp.selection.remove(&id);
                Ok(Removal {
                    item,
                    server_tracked,
                })
            }
        }
    }

    /// Removes every line of a product; returns the removed lines.
    pub fn remove_product(&mut self, product_id: ProductId) -> Result<Vec<RevisionItem>, EngineError> {
        self.require_collecting()?;
        Ok(self.store.remove_product(product_id))
    }

    /// Lines to send for comparison. Valid while collecting, or while
    /// comparing for a recompute.
    pub fn compare_snapshot(&self) -> Result<Vec<RevisionItem>, EngineError> {
        self.require_active()?;
        Ok(self.store.list_cloned())
    }

    /// Stores the merged comparison and switches to comparing. A recompute
    /// keeps the current filter.
    pub fn complete_compare(
        &mut self,
        snapshot: &[RevisionItem],
        payload: ComparisonPayload,
    ) -> Result<ComparisonTotals, EngineError> {
        self.require_active()?;
        let Phase::Active { mode, session } = &mut self.phase else {
            return Err(EngineError::NoSession);
        };

        let result = reconcile::reconcile(snapshot, payload);
        let totals = result.totals();
        let filter = match mode {
            Mode::Comparing(cmp) => cmp.filter,
            Mode::Collecting => ViewFilter::All,
        };
        *mode = Mode::Comparing(Comparison {
            result,
            filter,
            selection: BTreeSet::new(),
        });
        tracing::info!(
            revision_id = session.revision_id,
            total = totals.total,
            matched = totals.matched,
            mismatched = totals.mismatched,
            "comparison ready"
        );
        Ok(totals)
    }

    /// Discards the comparison and returns to collecting. The caller reloads.
    pub fn back_to_edit(&mut self) -> Result<(), EngineError> {
        self.require_comparing()?;
        if let Phase::Active { mode, .. } = &mut self.phase {
            *mode = Mode::Collecting;
        }
        Ok(())
    }

    /// Changes the comparison's view filter.
    pub fn set_filter(&mut self, filter: ViewFilter) -> Result<(), EngineError> {
        self.comparison_mut()?.filter = filter;
        Ok(())
    }

    /// Toggles `id` in the selection; returns whether it is now selected.
    pub fn toggle_selection(&mut self, id: ItemId) -> Result<bool, EngineError> {
        let cmp = self.comparison_mut()?;
        if cmp.result.get(id).is_none() {
            return Err(StoreError::MissingItem(id).into());
        }
        if cmp.selection.remove(&id) {
            return Ok(false);
        }
        cmp.selection.insert(id);
        Ok(true)
    }

    /// Empties the comparison selection.
    pub fn clear_selection(&mut self) -> Result<(), EngineError> {
        self.comparison_mut()?.selection.clear();
        Ok(())
    }

    /// Validates an annotation against the current selection.
    pub fn prepare_annotation(&self, comment: &str, target: AnnotationTarget) -> Result<Annotation, EngineError> {
        self.require_comparing()?;
        let selection = self.comparison().map(|c| &c.selection);
        let empty = BTreeSet::new();
        Ok(annotation::prepare(comment, target, selection.unwrap_or(&empty))?)
    }

    /// Records a successful finalize. Only valid while comparing.
    pub fn mark_finalized(&mut self) -> Result<(), EngineError> {
        let session = self.require_comparing()?.clone();
        tracing::info!(revision_id = session.revision_id, "revision finalized");
        self.phase = Phase::Finalized(session);
        Ok(())
    }

    /// Records a deleted revision and empties the store.
    pub fn mark_deleted(&mut self) -> Result<(), EngineError> {
        let revision_id = self.require_active()?.revision_id;
        tracing::info!(revision_id, "revision deleted");
        self.phase = Phase::NoSession;
        self.store.clear();
        Ok(())
    }

    fn comparison_mut(&mut self) -> Result<&mut Comparison, EngineError> {
        self.require_comparing()?;
        match &mut self.phase {
            Phase::Active {
                mode: Mode::Comparing(cmp),
                ..
            } => Ok(cmp),
            _ => Err(EngineError::NotComparing),
        }
    }
}
