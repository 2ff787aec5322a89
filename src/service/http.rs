//! REST client for the inventory backend (reqwest-based).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    engine::{annotation::Annotation, reconcile::ComparisonPayload},
    item::{RevisionItem, StockCandidate, StockKey},
    session::{NewRevision, RevisionSession},
    types::{ItemId, LocationId, Quantity, RevisionId},
};

use super::{
    wire::{
        Ack, AnnotationBody, ItemList, LocationBody, ManualItemBody, QuantityBody, StockList,
        WireComparison,
    },
    RemoveTarget, RevisionService, ServiceError, ServiceResult,
};

/// Supplies the bearer credential for each call. Owned by the external
/// session/auth collaborator.
pub trait CredentialSource: Send + Sync {
    /// Current token, or `None` when the operator is logged out.
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Connection settings for [`HttpRevisionService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("stockcount/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Clone)]
pub struct HttpRevisionService {
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
    http_client: Client,
}

impl std::fmt::Debug for HttpRevisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRevisionService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRevisionService {
    pub fn new(config: &ServiceConfig, credentials: Arc<dyn CredentialSource>) -> ServiceResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("base_url is empty".to_string()));
        }
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ServiceError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(&config.base_url, credentials, http_client))
    }

    /// Uses a pre-built `reqwest::Client`.
    pub fn with_http_client(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> ServiceResult<RequestBuilder> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(|| ServiceError::Unauthorized("no credential available".to_string()))?;
        Ok(builder.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let builder = self.authorize(self.http_client.get(&url).query(query))?;
        let response = builder.send().await?;
        handle_response(response).await
    }

    async fn send_ack(&self, builder: RequestBuilder) -> ServiceResult<()> {
        let response = self.authorize(builder)?.send().await?;
        handle_ack(response).await
    }

    async fn post_ack<B: Serialize>(&self, path: &str, query: &[(&str, String)], body: &B) -> ServiceResult<()> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.send_ack(self.http_client.post(&url).query(query).json(body)).await
    }

    async fn delete_ack(&self, path: &str) -> ServiceResult<()> {
        let url = self.url(path);
        debug!("DELETE {}", url);
        self.send_ack(self.http_client.delete(&url)).await
    }
}

#[async_trait]
impl RevisionService for HttpRevisionService {
    async fn create_revision(&self, new: &NewRevision) -> ServiceResult<RevisionSession> {
        let url = self.url("/revisions");
        debug!("POST {}", url);
        let builder = self.authorize(self.http_client.post(&url).json(new))?;
        handle_response(builder.send().await?).await
    }

    async fn open_revision(&self, revision_id: RevisionId) -> ServiceResult<RevisionSession> {
        self.get_json(&format!("/revisions/{revision_id}"), &[]).await
    }

    async fn list_items(&self, session: &RevisionSession) -> ServiceResult<Vec<RevisionItem>> {
        let list: ItemList = self
            .get_json(
                &format!("/revisions/{}/items", session.revision_id),
                &[("location", session.location_id.to_string())],
            )
            .await?;
        Ok(list.into_vec())
    }

    async fn search_items(&self, session: &RevisionSession, query: &str) -> ServiceResult<Vec<RevisionItem>> {
        let list: ItemList = self
            .get_json(
                &format!("/revisions/{}/items/search", session.revision_id),
                &[
                    ("location", session.location_id.to_string()),
                    ("query", query.to_string()),
                ],
            )
            .await?;
        Ok(list.into_vec())
    }

    async fn update_quantity(
        &self,
        session: &RevisionSession,
        item_id: ItemId,
        quantity: Quantity,
    ) -> ServiceResult<()> {
        let url = self.url(&format!(
            "/revisions/{}/items/{item_id}/quantity",
            session.revision_id
        ));
        debug!("PUT {}", url);
        self.send_ack(self.http_client.put(&url).json(&QuantityBody { quantity }))
            .await
    }

    async fn insert_item(&self, session: &RevisionSession, item: &RevisionItem) -> ServiceResult<()> {
        let body = ManualItemBody {
            location_id: session.location_id,
            item,
        };
        self.post_ack(&format!("/revisions/{}/items", session.revision_id), &[], &body)
            .await
    }

    async fn remove_item(&self, session: &RevisionSession, target: RemoveTarget) -> ServiceResult<()> {
        let path = match target {
            RemoveTarget::Item(id) => format!("/revisions/{}/items/{id}", session.revision_id),
            RemoveTarget::Product(id) => format!("/revisions/{}/products/{id}", session.revision_id),
        };
        self.delete_ack(&path).await
    }

    async fn compare(&self, session: &RevisionSession) -> ServiceResult<ComparisonPayload> {
        let url = self.url(&format!("/revisions/{}/comparison", session.revision_id));
        debug!("POST {}", url);
        let builder = self.authorize(
            self.http_client
                .post(&url)
                .query(&[("location", session.location_id.to_string())]),
        )?;
        let wire: WireComparison = handle_response(builder.send().await?).await?;
        Ok(wire.into())
    }

    async fn finalize(&self, session: &RevisionSession) -> ServiceResult<()> {
        let body = LocationBody {
            location_id: session.location_id,
        };
        self.post_ack(&format!("/revisions/{}/finalize", session.revision_id), &[], &body)
            .await
    }

    async fn delete_revision(&self, session: &RevisionSession) -> ServiceResult<()> {
        self.delete_ack(&format!("/revisions/{}", session.revision_id)).await
    }

    async fn annotate(&self, session: &RevisionSession, annotation: &Annotation) -> ServiceResult<()> {
        let body = AnnotationBody {
            comment: &annotation.comment,
            target: &annotation.target,
        };
        self.post_ack(&format!("/revisions/{}/annotations", session.revision_id), &[], &body)
            .await
    }

    async fn stock_listing(&self, location_id: LocationId) -> ServiceResult<Vec<StockCandidate>> {
        let list: StockList = self
            .get_json("/stock", &[("location", location_id.to_string())])
            .await?;
        Ok(list.into_vec())
    }

    async fn lookup_stock(&self, location_id: LocationId, key: &StockKey) -> ServiceResult<Option<StockCandidate>> {
        let key_param = match key {
            StockKey::Code(code) => ("code", code.clone()),
            StockKey::Id(id) => ("id", id.to_string()),
        };
        let query = [("location", location_id.to_string()), key_param];
        match self.get_json::<StockCandidate>("/stock/lookup", &query).await {
            Ok(candidate) => Ok(Some(candidate)),
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ServiceResult<T> {
    let status = response.status();
    if !status.is_success() {
        return handle_error_response(response).await;
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Parse(format!("failed to parse response: {e}")))
}

async fn handle_ack(response: reqwest::Response) -> ServiceResult<()> {
    let status = response.status();
    if !status.is_success() {
        return handle_error_response(response).await;
    }
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<Ack>(&body) {
        Ok(Ack { success: false, message }) => Err(ServiceError::Rejected(
            message.unwrap_or_else(|| format!("HTTP {status}")),
        )),
        _ => Ok(()),
    }
}

async fn handle_error_response<T>(response: reqwest::Response) -> ServiceResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());

    match status {
        StatusCode::NOT_FOUND => Err(ServiceError::NotFound(body)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(status = status.as_u16(), "backend refused credential");
            Err(ServiceError::Unauthorized(format!("{status}: {body}")))
        }
        _ => {
            let detail = if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            };
            Err(ServiceError::Status {
                status: status.as_u16(),
                detail,
            })
        }
    }
}
