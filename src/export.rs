//! CSV export of the displayed lines.

use std::io::Write;

use serde::Serialize;

use crate::{
    engine::reconcile::Origin,
    runtime::view::ViewRow,
    types::{Delta, ItemId, Quantity, SystemQuantity},
};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    id: ItemId,
    code: &'a str,
    name: &'a str,
    counted: Quantity,
    system: SystemQuantity,
    delta: Option<Delta>,
    status: &'static str,
    origin: Option<Origin>,
    comment: &'a str,
    unsynced: bool,
}

/// Writes one header row plus one row per line.
pub fn write_csv<W: Write>(rows: &[ViewRow], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        let status = match row.delta {
            Some(0) => "matched",
            Some(_) => "mismatched",
            None => "counted",
        };
        wtr.serialize(ExportRecord {
            id: row.item.id,
            code: &row.item.code,
            name: &row.item.name,
            counted: row.item.counted(),
            system: row.item.system,
            delta: row.delta,
            status,
            origin: row.origin,
            comment: row.item.comment.as_deref().unwrap_or(""),
            unsynced: row.unsynced,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
