//! SQLite-backed journal of unsynced quantity edits.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    edit::{StoredEdit, UnsyncedEdit, UnsyncedEditEnvelope, EDIT_FORMAT_VERSION},
    types::{EditSeq, ItemId, RevisionId},
};

use super::{DriftSink, PersistError, PersistResult};

/// SQLite implementation of [`crate::persist::DriftSink`].
pub struct SqliteDriftJournal {
    conn: Connection,
}

impl SqliteDriftJournal {
    /// Opens or creates a journal at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory journal.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Highest sequence ever journaled.
    pub fn latest_seq(&self) -> PersistResult<EditSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM unsynced_edits", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as EditSeq)
    }

    /// Deletes resolved rows; returns how many were removed.
    pub fn purge_resolved(&mut self) -> PersistResult<usize> {
        let count = self
            .conn
            .execute("DELETE FROM unsynced_edits WHERE resolved_ms IS NOT NULL", [])?;
        Ok(count)
    }
}

impl DriftSink for SqliteDriftJournal {
    fn record(&mut self, edit: &UnsyncedEdit) -> PersistResult<EditSeq> {
        let payload = serde_json::to_vec(&UnsyncedEditEnvelope::new(edit.clone()))?;
        self.conn.execute(
            "INSERT INTO unsynced_edits(ts_ms, revision_id, item_id, quantity, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now_ms() as i64,
                edit.revision_id as i64,
                edit.item_id as i64,
                edit.quantity as i64,
                payload,
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as EditSeq)
    }

    fn resolve_item(&mut self, revision_id: RevisionId, item_id: ItemId) -> PersistResult<usize> {
        let count = self.conn.execute(
            "UPDATE unsynced_edits SET resolved_ms = ?1 WHERE revision_id = ?2 AND item_id = ?3 AND resolved_ms IS NULL",
            params![now_ms() as i64, revision_id as i64, item_id as i64],
        )?;
        Ok(count)
    }

    fn resolve_revision(&mut self, revision_id: RevisionId) -> PersistResult<usize> {
        let count = self.conn.execute(
            "UPDATE unsynced_edits SET resolved_ms = ?1 WHERE revision_id = ?2 AND resolved_ms IS NULL",
            params![now_ms() as i64, revision_id as i64],
        )?;
        Ok(count)
    }

    fn pending(&self, revision_id: RevisionId) -> PersistResult<Vec<StoredEdit>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts_ms, payload FROM unsynced_edits WHERE revision_id = ?1 AND resolved_ms IS NULL ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![revision_id as i64], |row| {
            let seq: i64 = row.get(0)?;
            let ts_ms: i64 = row.get(1)?;
            let payload: Vec<u8> = row.get(2)?;
            let edit = decode_edit_payload(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })?;
            Ok(StoredEdit {
                seq: seq as EditSeq,
                ts_ms: ts_ms as u64,
                edit,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn decode_edit_payload(payload: &[u8]) -> Result<UnsyncedEdit, PersistError> {
    let envelope: UnsyncedEditEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != EDIT_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "unsupported edit format version: {}",
            envelope.format_version
        )));
    }
    Ok(envelope.edit)
}
