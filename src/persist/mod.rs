pub mod sqlite;

use crate::{
    edit::{StoredEdit, UnsyncedEdit},
    types::{EditSeq, ItemId, RevisionId},
};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable record of client/server quantity divergence.
pub trait DriftSink: Send {
    /// Appends a failed edit and returns its sequence.
    fn record(&mut self, edit: &UnsyncedEdit) -> PersistResult<EditSeq>;
    /// Resolves every open edit of `item_id`; returns how many were resolved.
    fn resolve_item(&mut self, revision_id: RevisionId, item_id: ItemId) -> PersistResult<usize>;
    /// Resolves every open edit of the revision.
    fn resolve_revision(&mut self, revision_id: RevisionId) -> PersistResult<usize>;
    /// Open edits of the revision, oldest first.
    fn pending(&self, revision_id: RevisionId) -> PersistResult<Vec<StoredEdit>>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
