use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use hashbrown::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    edit::{StoredEdit, UnsyncedEdit},
    engine::{
        acquisition::{self, SearchOutcome},
        annotation::AnnotationTarget,
        machine::{EngineError, Removal, RevisionMachine, ValidationError},
        reconcile::ComparisonTotals,
    },
    item::{RevisionItem, StockCandidate, StockKey},
    persist::{DriftSink, PersistError},
    service::{RemoveTarget, RevisionService, ServiceError},
    session::{NewRevision, RevisionSession},
    types::{ItemId, ProductId, Quantity, RevisionId, ViewFilter},
};

use super::{events::RevisionEvent, view::SessionView};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("stock candidate {0} no longer exists")]
    CandidateNotFound(ItemId),
    /// The comment was stored by the backend but the comparison could not be
    /// refreshed. The shown comparison is the one from before the annotation.
    #[error("annotation was applied but the comparison refresh failed: {0}")]
    AnnotationRefreshFailed(#[source] Box<RuntimeError>),
    #[error("a comparison, annotation, or finalize request is already in flight")]
    Busy,
    #[error("revision runtime is closed")]
    ChannelClosed,
}

impl From<ValidationError> for RuntimeError {
    fn from(value: ValidationError) -> Self {
        Self::Engine(EngineError::Validation(value))
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
    pub sync_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            sync_queue_bound: 128,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Start {
        new: NewRevision,
        resp: Reply<RevisionSession>,
    },
    Resume {
        revision_id: RevisionId,
        resp: Reply<RevisionSession>,
    },
    Reload {
        resp: Reply<usize>,
    },
    Search {
        query: String,
        resp: Reply<SearchOutcome>,
    },
    StockListing {
        resp: Reply<Vec<StockCandidate>>,
    },
    SelectCandidate {
        key: StockKey,
        resp: Reply<Option<StockCandidate>>,
    },
    AddManual {
        candidate: StockCandidate,
        quantity: Quantity,
        resp: Reply<ItemId>,
    },
    SetQuantity {
        id: ItemId,
        quantity: Quantity,
        resp: Reply<()>,
    },
    Remove {
        id: ItemId,
        resp: Reply<Removal>,
    },
    RemoveProduct {
        product_id: ProductId,
        resp: Reply<usize>,
    },
    FinishAdding {
        resp: Reply<ComparisonTotals>,
    },
    BackToEdit {
        resp: Reply<usize>,
    },
    SetFilter {
        filter: ViewFilter,
        resp: Reply<()>,
    },
    ToggleSelection {
        id: ItemId,
        resp: Reply<bool>,
    },
    Annotate {
        comment: String,
        target: AnnotationTarget,
        resp: Reply<ComparisonTotals>,
    },
    Finalize {
        resp: Reply<()>,
    },
    Delete {
        resp: Reply<()>,
    },
    Unsynced {
        resp: Reply<Vec<StoredEdit>>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

impl Command {
    fn holds_busy(&self) -> bool {
        matches!(
            self,
            Command::FinishAdding { .. } | Command::Annotate { .. } | Command::Finalize { .. }
        )
    }
}

/// Outcome of one background quantity sync.
struct SyncOutcome {
    revision_id: RevisionId,
    id: ItemId,
    quantity: Quantity,
    epoch: u64,
    result: Result<(), String>,
}

/// A line with an update in flight, sent under `epoch`. At most one update per
/// line is sent at a time; edits confirmed meanwhile collapse into `queued`.
#[derive(Debug)]
struct LineSync {
    epoch: u64,
    queued: Option<Quantity>,
}

type SharedSink = Arc<Mutex<Box<dyn DriftSink>>>;

/// Cloneable front end to one revision runtime.
#[derive(Clone)]
pub struct RevisionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RevisionEvent>,
    view_rx: watch::Receiver<SessionView>,
    busy: Arc<AtomicBool>,
}

/// Spawns the single-owner loop that holds the revision state.
pub fn spawn_revision(
    service: Arc<dyn RevisionService>,
    drift: Option<Box<dyn DriftSink>>,
    config: RuntimeConfig,
) -> RevisionHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<RevisionEvent>(config.event_capacity);
    let (view_tx, view_rx) = watch::channel(SessionView::default());
    let (sync_tx, mut sync_rx) = mpsc::channel::<SyncOutcome>(config.sync_queue_bound);
    let busy = Arc::new(AtomicBool::new(false));

    let mut runtime = Runtime {
        service,
        drift: drift.map(|sink| Arc::new(Mutex::new(sink))),
        machine: RevisionMachine::new(),
        unsynced: BTreeSet::new(),
        line_syncs: HashMap::new(),
        sync_epoch: 0,
        events_tx: events_tx.clone(),
        view_tx,
        sync_tx,
        busy: Arc::clone(&busy),
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if cmd.holds_busy() {
                        runtime.publish();
                    }
                    let done = runtime.handle_command(cmd).await;
                    if done {
                        break;
                    }
                }
                outcome = sync_rx.recv() => {
                    if let Some(outcome) = outcome {
                        if let Some(event) = runtime.apply_sync_outcome(outcome).await {
                            runtime.publish();
                            runtime.emit(event);
                        }
                    }
                }
            }
        }
    });

    RevisionHandle {
        cmd_tx,
        events_tx,
        view_rx,
        busy,
    }
}

impl RevisionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RevisionEvent> {
        self.events_tx.subscribe()
    }

    /// Latest published snapshot. Never waits on in-flight calls.
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    /// Receiver that is notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// True while a comparison, annotation, or finalize request is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn start(&self, new: NewRevision) -> Result<RevisionSession, RuntimeError> {
        self.request(|resp| Command::Start { new, resp }).await
    }

    pub async fn resume(&self, revision_id: RevisionId) -> Result<RevisionSession, RuntimeError> {
        self.request(|resp| Command::Resume { revision_id, resp }).await
    }

    /// Bulk load; returns the number of lines now held.
    pub async fn reload(&self) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::Reload { resp }).await
    }

    pub async fn search(&self, query: impl Into<String>) -> Result<SearchOutcome, RuntimeError> {
        let query = query.into();
        self.request(|resp| Command::Search { query, resp }).await
    }

    pub async fn stock_listing(&self) -> Result<Vec<StockCandidate>, RuntimeError> {
        self.request(|resp| Command::StockListing { resp }).await
    }

    /// Looks the candidate up again so its ledger quantity is current.
    pub async fn select_candidate(&self, key: StockKey) -> Result<Option<StockCandidate>, RuntimeError> {
        self.request(|resp| Command::SelectCandidate { key, resp }).await
    }

    pub async fn add_manual(&self, candidate: StockCandidate, quantity: Quantity) -> Result<ItemId, RuntimeError> {
        self.request(|resp| Command::AddManual {
            candidate,
            quantity,
            resp,
        })
        .await
    }

    /// Applies a confirmed quantity locally and syncs it in the background.
    /// Only the local apply is awaited.
    pub async fn set_quantity(&self, id: ItemId, quantity: Quantity) -> Result<(), RuntimeError> {
        self.request(|resp| Command::SetQuantity { id, quantity, resp })
            .await
    }

    pub async fn remove(&self, id: ItemId) -> Result<Removal, RuntimeError> {
        self.request(|resp| Command::Remove { id, resp }).await
    }

    pub async fn remove_product(&self, product_id: ProductId) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::RemoveProduct { product_id, resp })
            .await
    }

    /// Collecting -> Comparing. Rejected with [`RuntimeError::Busy`] while
    /// another guarded request is in flight.
    pub async fn finish_adding(&self) -> Result<ComparisonTotals, RuntimeError> {
        self.guarded(|resp| Command::FinishAdding { resp }).await
    }

    /// Comparing -> Collecting with a fresh bulk load. If the load fails the
    /// comparison stays in place.
    pub async fn back_to_edit(&self) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::BackToEdit { resp }).await
    }

    pub async fn set_filter(&self, filter: ViewFilter) -> Result<(), RuntimeError> {
        self.request(|resp| Command::SetFilter { filter, resp }).await
    }

    pub async fn toggle_selection(&self, id: ItemId) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::ToggleSelection { id, resp }).await
    }

    /// Attaches `comment` and recomputes the comparison. A failed recompute
    /// after an accepted annotation is [`RuntimeError::AnnotationRefreshFailed`].
    pub async fn annotate(
        &self,
        comment: impl Into<String>,
        target: AnnotationTarget,
    ) -> Result<ComparisonTotals, RuntimeError> {
        let comment = comment.into();
        self.guarded(|resp| Command::Annotate {
            comment,
            target,
            resp,
        })
        .await
    }

    pub async fn finalize(&self) -> Result<(), RuntimeError> {
        self.guarded(|resp| Command::Finalize { resp }).await
    }

    pub async fn delete(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Delete { resp }).await
    }

    /// Journaled edits of the open revision still awaiting resync.
    pub async fn unsynced_edits(&self) -> Result<Vec<StoredEdit>, RuntimeError> {
        self.request(|resp| Command::Unsynced { resp }).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn guarded<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RuntimeError::Busy);
        }
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(make(tx)).await.is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(RuntimeError::ChannelClosed);
        }
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

struct Runtime {
    service: Arc<dyn RevisionService>,
    drift: Option<SharedSink>,
    machine: RevisionMachine,
    unsynced: BTreeSet<ItemId>,
    line_syncs: HashMap<ItemId, LineSync>,
    sync_epoch: u64,
    events_tx: broadcast::Sender<RevisionEvent>,
    view_tx: watch::Sender<SessionView>,
    sync_tx: mpsc::Sender<SyncOutcome>,
    busy: Arc<AtomicBool>,
}

impl Runtime {
    fn publish(&self) {
        let view = SessionView::capture(&self.machine, &self.unsynced, self.busy.load(Ordering::Acquire));
        self.view_tx.send_replace(view);
    }

    fn release_busy(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Publishes the new view, then answers the caller.
    fn reply<T>(&self, resp: Reply<T>, out: Result<T, RuntimeError>) {
        self.publish();
        let _ = resp.send(out);
    }

    fn emit(&self, event: RevisionEvent) {
        let _ = self.events_tx.send(event);
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Start { new, resp } => {
                let out = self.start(new).await;
                self.reply(resp, out);
            }
            Command::Resume { revision_id, resp } => {
                let out = self.resume(revision_id).await;
                self.reply(resp, out);
            }
            Command::Reload { resp } => {
                let out = self.reload().await;
                self.reply(resp, out);
            }
            Command::Search { query, resp } => {
                let out = self.search(&query).await;
                self.reply(resp, out);
            }
            Command::StockListing { resp } => {
                let out = self.stock_listing().await;
                self.reply(resp, out);
            }
            Command::SelectCandidate { key, resp } => {
                let out = self.select_candidate(&key).await;
                self.reply(resp, out);
            }
            Command::AddManual {
                candidate,
                quantity,
                resp,
            } => {
                let out = self.add_manual(candidate, quantity).await;
                self.reply(resp, out);
            }
            Command::SetQuantity { id, quantity, resp } => {
                let out = self.set_quantity(id, quantity);
                self.reply(resp, out);
            }
            Command::Remove { id, resp } => {
                let out = self.remove(id).await;
                self.reply(resp, out);
            }
            Command::RemoveProduct { product_id, resp } => {
                let out = self.remove_product(product_id).await;
                self.reply(resp, out);
            }
            Command::FinishAdding { resp } => {
                let out = self.finish_adding().await;
                self.release_busy();
                self.reply(resp, out);
            }
            Command::BackToEdit { resp } => {
                let out = self.back_to_edit().await;
                self.reply(resp, out);
            }
            Command::SetFilter { filter, resp } => {
                let out = self.machine.set_filter(filter).map_err(RuntimeError::from);
                self.reply(resp, out);
            }
            Command::ToggleSelection { id, resp } => {
                let out = self.machine.toggle_selection(id).map_err(RuntimeError::from);
                self.reply(resp, out);
            }
            Command::Annotate {
                comment,
                target,
                resp,
            } => {
                let out = self.annotate(&comment, target).await;
                self.release_busy();
                self.reply(resp, out);
            }
            Command::Finalize { resp } => {
                let out = self.finalize().await;
                self.release_busy();
                self.reply(resp, out);
            }
            Command::Delete { resp } => {
                let out = self.delete().await;
                self.reply(resp, out);
            }
            Command::Unsynced { resp } => {
                let out = self.unsynced_edits().await;
                self.reply(resp, out);
            }
            Command::Shutdown { resp } => {
                let out = match &self.drift {
                    Some(sink) => with_sink(sink, |s| s.flush()).await,
                    None => Ok(()),
                };
                self.reply(resp, out.map_err(RuntimeError::from));
                return true;
            }
        }

        false
    }

    async fn start(&mut self, new: NewRevision) -> Result<RevisionSession, RuntimeError> {
        self.ensure_closed()?;
        let session = self.service.create_revision(&new).await?;
        self.open(session).await
    }

    async fn resume(&mut self, revision_id: RevisionId) -> Result<RevisionSession, RuntimeError> {
        self.ensure_closed()?;
        let session = self.service.open_revision(revision_id).await?;
        self.open(session).await
    }

    fn ensure_closed(&self) -> Result<(), RuntimeError> {
        if self.machine.require_active().is_ok() {
            return Err(EngineError::SessionOpen.into());
        }
        Ok(())
    }

    async fn open(&mut self, session: RevisionSession) -> Result<RevisionSession, RuntimeError> {
        let items = self.service.list_items(&session).await?;
        let count = items.len();
        self.machine.open(session.clone(), items)?;
        self.line_syncs.clear();
        self.resync_markers(session.revision_id).await;
        self.emit(RevisionEvent::Opened {
            revision_id: session.revision_id,
        });
        self.emit(RevisionEvent::Loaded { items: count });
        Ok(session)
    }

    async fn reload(&mut self) -> Result<usize, RuntimeError> {
        let session = self.machine.require_collecting()?.clone();
        let items = self.service.list_items(&session).await?;
        self.install_load(session.revision_id, items).await
    }

    async fn install_load(&mut self, revision_id: RevisionId, items: Vec<RevisionItem>) -> Result<usize, RuntimeError> {
        self.machine.apply_bulk_load(items)?;
        self.resync_markers(revision_id).await;
        let count = self.machine.store().len();
        self.emit(RevisionEvent::Loaded { items: count });
        Ok(count)
    }

    /// A bulk load is the authoritative resync: clear markers, resolve the
    /// journal, drop queued edits, and orphan outcomes of in-flight updates.
    async fn resync_markers(&mut self, revision_id: RevisionId) {
        self.unsynced.clear();
        self.sync_epoch += 1;
        for line in self.line_syncs.values_mut() {
            line.queued = None;
        }
        if let Some(sink) = &self.drift {
            if let Err(err) = with_sink(sink, move |s| s.resolve_revision(revision_id)).await {
                warn!(revision_id, error = %err, "failed to resolve unsynced journal");
            }
        }
    }

    async fn search(&mut self, query: &str) -> Result<SearchOutcome, RuntimeError> {
        let query = acquisition::normalize_query(query)?;
        let session = self.machine.require_collecting()?.clone();
        let found = self.service.search_items(&session, query).await?;
        let outcome = self.machine.merge_search(found)?;
        match &outcome {
            SearchOutcome::Added(ids) => self.emit(RevisionEvent::ItemsAdded { ids: ids.clone() }),
            SearchOutcome::NotFound => debug!(query, "search found nothing"),
            SearchOutcome::AlreadyPresent(ids) => debug!(?ids, "search matched counted lines"),
        }
        Ok(outcome)
    }

    async fn stock_listing(&mut self) -> Result<Vec<StockCandidate>, RuntimeError> {
        let location_id = self.machine.require_collecting()?.location_id;
        Ok(self.service.stock_listing(location_id).await?)
    }

    async fn select_candidate(&mut self, key: &StockKey) -> Result<Option<StockCandidate>, RuntimeError> {
        let location_id = self.machine.require_collecting()?.location_id;
        Ok(self.service.lookup_stock(location_id, key).await?)
    }

    async fn add_manual(&mut self, candidate: StockCandidate, quantity: Quantity) -> Result<ItemId, RuntimeError> {
        acquisition::check_manual_quantity(quantity)?;
        let session = self.machine.require_collecting()?.clone();
        self.machine.ensure_new_line(candidate.id)?;
        let fresh = self
            .service
            .lookup_stock(session.location_id, &StockKey::Id(candidate.id))
            .await?
            .ok_or(RuntimeError::CandidateNotFound(candidate.id))?;
        let item = acquisition::manual_item(&candidate, fresh.system, quantity)?;
        self.service.insert_item(&session, &item).await?;
        let id = item.id;
        self.machine.commit_manual(item)?;
        self.emit(RevisionEvent::ItemsAdded { ids: vec![id] });
        Ok(id)
    }

    fn set_quantity(&mut self, id: ItemId, quantity: Quantity) -> Result<(), RuntimeError> {
        let session = self.machine.require_collecting()?.clone();
        let previous = self.machine.set_quantity(id, quantity)?;
        if previous == quantity {
            return Ok(());
        }
        self.emit(RevisionEvent::QuantityChanged { id, quantity });

        match self.line_syncs.get_mut(&id) {
            Some(line) => {
                debug!(item_id = id, quantity, "quantity sync queued behind in-flight update");
                line.queued = Some(quantity);
            }
            None => self.dispatch_sync(session, id, quantity),
        }
        Ok(())
    }

    fn dispatch_sync(&mut self, session: RevisionSession, id: ItemId, quantity: Quantity) {
        let epoch = self.sync_epoch;
        self.line_syncs.insert(id, LineSync { epoch, queued: None });
        let service = Arc::clone(&self.service);
        let sync_tx = self.sync_tx.clone();
        tokio::spawn(async move {
            let result = service
                .update_quantity(&session, id, quantity)
                .await
                .map_err(|e| e.to_string());
            let _ = sync_tx
                .send(SyncOutcome {
                    revision_id: session.revision_id,
                    id,
                    quantity,
                    epoch,
                    result,
                })
                .await;
        });
    }

    /// Applies a background sync result; returns the event to emit once the
    /// view is republished.
    async fn apply_sync_outcome(&mut self, outcome: SyncOutcome) -> Option<RevisionEvent> {
        let current = self.machine.session().map(|s| s.revision_id);
        if current != Some(outcome.revision_id) {
            debug!(item_id = outcome.id, "quantity sync outcome for a closed revision ignored");
            return None;
        }

        let owns_line = self
            .line_syncs
            .get(&outcome.id)
            .is_some_and(|line| line.epoch == outcome.epoch);
        if !owns_line {
            debug!(item_id = outcome.id, "quantity sync outcome from a previous session ignored");
            return None;
        }
        let queued = self.line_syncs.remove(&outcome.id).and_then(|line| line.queued);
        if let Some(next) = queued {
            debug!(item_id = outcome.id, quantity = next, "sending queued quantity after superseded update");
            if let Ok(session) = self.machine.require_active().cloned() {
                self.dispatch_sync(session, outcome.id, next);
            }
            return None;
        }
        if outcome.epoch != self.sync_epoch || !self.machine.store().contains(outcome.id) {
            debug!(item_id = outcome.id, "quantity sync outcome predates last load or removal");
            return None;
        }

        let SyncOutcome {
            revision_id,
            id,
            quantity,
            result,
            ..
        } = outcome;

        match result {
            Ok(()) => {
                if self.unsynced.remove(&id) {
                    if let Some(sink) = &self.drift {
                        if let Err(err) = with_sink(sink, move |s| s.resolve_item(revision_id, id)).await {
                            warn!(item_id = id, error = %err, "failed to resolve unsynced edit");
                        }
                    }
                    return Some(RevisionEvent::QuantitySyncRecovered { id });
                }
                None
            }
            Err(error) => {
                warn!(
                    revision_id,
                    item_id = id,
                    quantity,
                    error = %error,
                    "quantity sync failed; local value diverges from backend until reload"
                );
                self.unsynced.insert(id);
                if let Some(sink) = &self.drift {
                    let edit = UnsyncedEdit {
                        revision_id,
                        item_id: id,
                        quantity,
                        error: error.clone(),
                    };
                    if let Err(err) = with_sink(sink, move |s| s.record(&edit).map(|_| ())).await {
                        warn!(item_id = id, error = %err, "failed to journal unsynced edit");
                    }
                }
                Some(RevisionEvent::QuantitySyncFailed { id, quantity, error })
            }
        }
    }

    async fn remove(&mut self, id: ItemId) -> Result<Removal, RuntimeError> {
        let session = self.machine.require_active()?.clone();
        if self.machine.is_server_tracked(id)? {
            self.service.remove_item(&session, RemoveTarget::Item(id)).await?;
        }
        let removal = self.machine.remove(id)?;
        self.unsynced.remove(&id);
        if let Some(line) = self.line_syncs.get_mut(&id) {
            line.queued = None;
        }
        self.emit(RevisionEvent::ItemRemoved {
            id,
            server_tracked: removal.server_tracked,
        });
        Ok(removal)
    }

    async fn remove_product(&mut self, product_id: ProductId) -> Result<usize, RuntimeError> {
        let session = self.machine.require_collecting()?.clone();
        self.service
            .remove_item(&session, RemoveTarget::Product(product_id))
            .await?;
        let removed = self.machine.remove_product(product_id)?;
        for item in &removed {
            self.unsynced.remove(&item.id);
            if let Some(line) = self.line_syncs.get_mut(&item.id) {
                line.queued = None;
            }
            self.emit(RevisionEvent::ItemRemoved {
                id: item.id,
                server_tracked: true,
            });
        }
        Ok(removed.len())
    }

    async fn finish_adding(&mut self) -> Result<ComparisonTotals, RuntimeError> {
        self.machine.require_collecting()?;
        self.compare().await
    }

    /// Requests a comparison and merges it with the lines held now. On
    /// failure the machine is left untouched.
    async fn compare(&mut self) -> Result<ComparisonTotals, RuntimeError> {
        let session = self.machine.require_active()?.clone();
        let snapshot = self.machine.compare_snapshot()?;
        let payload = self.service.compare(&session).await?;
        let totals = self.machine.complete_compare(&snapshot, payload)?;
        self.emit(RevisionEvent::Compared { totals });
        Ok(totals)
    }

    /// Loads first, so a failed load leaves the comparison in place.
    async fn back_to_edit(&mut self) -> Result<usize, RuntimeError> {
        let session = self.machine.require_comparing()?.clone();
        let items = self.service.list_items(&session).await?;
        self.machine.back_to_edit()?;
        self.emit(RevisionEvent::ReturnedToEdit);
        self.install_load(session.revision_id, items).await
    }

    async fn annotate(&mut self, comment: &str, target: AnnotationTarget) -> Result<ComparisonTotals, RuntimeError> {
        let annotation = self.machine.prepare_annotation(comment, target)?;
        let session = self.machine.require_comparing()?.clone();
        self.service.annotate(&session, &annotation).await?;
        self.machine.clear_selection()?;
        self.emit(RevisionEvent::Annotated {
            targets: annotation.explicit_len(),
        });
        self.compare()
            .await
            .map_err(|err| RuntimeError::AnnotationRefreshFailed(Box::new(err)))
    }

    async fn finalize(&mut self) -> Result<(), RuntimeError> {
        let session = self.machine.require_comparing()?.clone();
        self.service.finalize(&session).await?;
        self.machine.mark_finalized()?;
        self.emit(RevisionEvent::Finalized {
            revision_id: session.revision_id,
        });
        Ok(())
    }

    async fn delete(&mut self) -> Result<(), RuntimeError> {
        let session = self.machine.require_active()?.clone();
        self.service.delete_revision(&session).await?;
        self.machine.mark_deleted()?;
        self.line_syncs.clear();
        self.resync_markers(session.revision_id).await;
        info!(revision_id = session.revision_id, "revision torn down");
        self.emit(RevisionEvent::Deleted {
            revision_id: session.revision_id,
        });
        Ok(())
    }

    async fn unsynced_edits(&mut self) -> Result<Vec<StoredEdit>, RuntimeError> {
        let Some(revision_id) = self.machine.session().map(|s| s.revision_id) else {
            return Err(EngineError::NoSession.into());
        };
        match &self.drift {
            Some(sink) => Ok(with_sink(sink, move |s| s.pending(revision_id)).await?),
            None => Ok(Vec::new()),
        }
    }
}

async fn with_sink<T, F>(sink: &SharedSink, f: F) -> Result<T, PersistError>
where
    T: Send + 'static,
    F: FnOnce(&mut Box<dyn DriftSink>) -> Result<T, PersistError> + Send + 'static,
{
    let sink_ref = Arc::clone(sink);
    tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        f(&mut *sink)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}
