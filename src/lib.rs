//! Inventory revision (stock count) engine: collect counted lines, reconcile
//! them against the ledger, annotate discrepancies, and finalize.
//!
//! # Examples
//!
//! Sans-IO usage with [`engine::machine::RevisionMachine`]:
//! ```
//! use stockcount::{
//!     engine::{machine::RevisionMachine, reconcile::ComparisonPayload},
//!     item::RevisionItem,
//!     session::RevisionSession,
//!     types::CountType,
//! };
//!
//! let mut machine = RevisionMachine::new();
//! let session = RevisionSession {
//!     revision_id: 7,
//!     location_id: 1,
//!     count_type: CountType::Selective,
//!     track_variants: false,
//! };
//! machine
//!     .open(session, vec![RevisionItem::new(1, "Cola 0.5", "5900001", 4, 6)])
//!     .expect("open");
//!
//! let snapshot = machine.compare_snapshot().expect("snapshot");
//! let totals = machine
//!     .complete_compare(&snapshot, ComparisonPayload::default())
//!     .expect("compare");
//! assert_eq!(totals.mismatched, 1);
//! ```
//!
//! Runtime usage with the HTTP service and SQLite drift journal:
//! ```no_run
//! use std::sync::Arc;
//!
//! use stockcount::{
//!     persist::sqlite::SqliteDriftJournal,
//!     runtime::handle::{spawn_revision, RuntimeConfig},
//!     service::http::{HttpRevisionService, ServiceConfig, StaticToken},
//!     session::NewRevision,
//!     types::CountType,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ServiceConfig::new("https://inventory.example.com/api");
//! let service = HttpRevisionService::new(&config, Arc::new(StaticToken("token".to_string()))).expect("client");
//! let journal = SqliteDriftJournal::open("drift.db").expect("open sqlite");
//! let handle = spawn_revision(Arc::new(service), Some(Box::new(journal)), RuntimeConfig::default());
//! handle
//!     .start(NewRevision { location_id: 1, count_type: CountType::AllProducts, track_variants: false })
//!     .await
//!     .expect("start");
//! handle.search("5900001").await.expect("search");
//! handle.finish_adding().await.expect("compare");
//! handle.finalize().await.expect("finalize");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// In-memory item store and quantity editor.
pub mod core;
/// Unsynced edit records and journal envelope.
pub mod edit;
/// Session state machine and reconciliation rules.
pub mod engine;
/// CSV export of displayed lines.
pub mod export;
/// Counted line and stock candidate records.
pub mod item;
/// Tracing subscriber bootstrap.
pub mod logging;
/// Drift journal abstraction and SQLite implementation.
pub mod persist;
/// Single-owner runtime handle, views, and events.
pub mod runtime;
/// Backing inventory service contract and HTTP client.
pub mod service;
/// Revision session identity.
pub mod session;
/// Shared primitive types and enums.
pub mod types;
