//! Backing inventory service contract.

/// reqwest implementation of [`RevisionService`].
pub mod http;
/// JSON request and response shapes.
pub mod wire;

use async_trait::async_trait;

use crate::{
    engine::{annotation::Annotation, reconcile::ComparisonPayload},
    item::{RevisionItem, StockCandidate, StockKey},
    session::{NewRevision, RevisionSession},
    types::{ItemId, LocationId, ProductId, Quantity, RevisionId},
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("service rejected the request: {0}")]
    Rejected(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// What a remove call deletes server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoveTarget {
    Item(ItemId),
    Product(ProductId),
}

/// Operations the engine needs from the inventory backend. Every call takes
/// the session explicitly.
#[async_trait]
pub trait RevisionService: Send + Sync + 'static {
    async fn create_revision(&self, new: &NewRevision) -> ServiceResult<RevisionSession>;
    async fn open_revision(&self, revision_id: RevisionId) -> ServiceResult<RevisionSession>;
    async fn list_items(&self, session: &RevisionSession) -> ServiceResult<Vec<RevisionItem>>;
    async fn search_items(&self, session: &RevisionSession, query: &str) -> ServiceResult<Vec<RevisionItem>>;
    async fn update_quantity(
        &self,
        session: &RevisionSession,
        item_id: ItemId,
        quantity: Quantity,
    ) -> ServiceResult<()>;
    async fn insert_item(&self, session: &RevisionSession, item: &RevisionItem) -> ServiceResult<()>;
    async fn remove_item(&self, session: &RevisionSession, target: RemoveTarget) -> ServiceResult<()>;
    async fn compare(&self, session: &RevisionSession) -> ServiceResult<ComparisonPayload>;
    async fn finalize(&self, session: &RevisionSession) -> ServiceResult<()>;
    async fn delete_revision(&self, session: &RevisionSession) -> ServiceResult<()>;
    async fn annotate(&self, session: &RevisionSession, annotation: &Annotation) -> ServiceResult<()>;
    async fn stock_listing(&self, location_id: LocationId) -> ServiceResult<Vec<StockCandidate>>;
    /// `Ok(None)` when nothing matches the key.
    async fn lookup_stock(&self, location_id: LocationId, key: &StockKey) -> ServiceResult<Option<StockCandidate>>;
}
