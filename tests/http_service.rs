use std::sync::Arc;

use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use stockcount::{
    engine::annotation::{Annotation, ResolvedTarget},
    item::StockKey,
    service::{
        http::{CredentialSource, HttpRevisionService, ServiceConfig, StaticToken},
        RemoveTarget, RevisionService, ServiceError,
    },
    session::{NewRevision, RevisionSession},
    types::CountType,
};

fn session() -> RevisionSession {
    RevisionSession {
        revision_id: 12,
        location_id: 3,
        count_type: CountType::Selective,
        track_variants: false,
    }
}

fn client(server: &MockServer) -> HttpRevisionService {
    let config = ServiceConfig::new(server.uri());
    HttpRevisionService::new(&config, Arc::new(StaticToken("secret".to_string()))).expect("client")
}

fn line_json(id: u64, counted: u64, system: i64) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("item {id}"),
        "code": format!("59{id:05}"),
        "counted": counted,
        "system": system,
    })
}

struct LoggedOut;

impl CredentialSource for LoggedOut {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn create_revision_posts_parameters_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revisions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "location_id": 3,
            "count_type": "by_category",
            "track_variants": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "revision_id": 12,
            "location_id": 3,
            "count_type": "by_category",
            "track_variants": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_revision(&NewRevision {
            location_id: 3,
            count_type: CountType::ByCategory,
            track_variants: true,
        })
        .await
        .expect("create");
    assert_eq!(created.revision_id, 12);
    assert!(created.track_variants);
}

#[tokio::test]
async fn list_items_accepts_bare_and_wrapped_arrays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/revisions/12/items"))
        .and(query_param("location", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([line_json(1, 2, 2)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/revisions/12/items/search"))
        .and(query_param("query", "5900002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [line_json(2, 1, 0)] })))
        .mount(&server)
        .await;

    let svc = client(&server);
    let items = svc.list_items(&session()).await.expect("list");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].counted(), 2);

    let found = svc.search_items(&session(), "5900002").await.expect("search");
    assert_eq!(found[0].id, 2);
}

#[tokio::test]
async fn comparison_partitions_are_unioned_and_counters_ignored() {
    let server = MockServer::start().await;
    let mut mismatched = line_json(2, 1, 4);
    mismatched["delta"] = json!(-3);
    Mock::given(method("POST"))
        .and(path("/revisions/12/comparison"))
        .and(query_param("location", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matched": [line_json(1, 2, 2)],
            "mismatched": [mismatched],
            "matched_count": 40,
            "mismatched_count": 40,
        })))
        .mount(&server)
        .await;

    let payload = client(&server).compare(&session()).await.expect("compare");
    assert_eq!(payload.items.len(), 2);
    assert_eq!(payload.items[0].delta, None);
    assert_eq!(payload.items[1].delta, Some(-3));
}

#[tokio::test]
async fn quantity_update_accepts_empty_body_and_rejects_success_false() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/revisions/12/items/1/quantity"))
        .and(body_json(json!({ "quantity": 5 })))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/revisions/12/items/2/quantity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "line locked",
        })))
        .mount(&server)
        .await;

    let svc = client(&server);
    svc.update_quantity(&session(), 1, 5).await.expect("update");
    let err = svc.update_quantity(&session(), 2, 5).await.expect_err("rejected");
    assert!(matches!(err, ServiceError::Rejected(msg) if msg == "line locked"));
}

#[tokio::test]
async fn remove_routes_by_target() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/revisions/12/items/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/revisions/12/products/9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let svc = client(&server);
    svc.remove_item(&session(), RemoveTarget::Item(7)).await.expect("item");
    svc.remove_item(&session(), RemoveTarget::Product(9)).await.expect("product");
}

#[tokio::test]
async fn annotation_body_carries_resolved_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revisions/12/annotations"))
        .and(body_json(json!({
            "comment": "damaged",
            "target": { "items": [1, 2] },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .annotate(
            &session(),
            &Annotation {
                comment: "damaged".to_string(),
                target: ResolvedTarget::Items(vec![1, 2]),
            },
        )
        .await
        .expect("annotate");
}

#[tokio::test]
async fn stock_lookup_maps_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock/lookup"))
        .and(query_param("id", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 40,
            "name": "Juice",
            "code": "5900040",
            "unit": "pcs",
            "system": 8,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock/lookup"))
        .and(query_param("code", "none"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such stock"))
        .mount(&server)
        .await;

    let svc = client(&server);
    let found = svc.lookup_stock(3, &StockKey::Id(40)).await.expect("lookup");
    assert_eq!(found.map(|c| c.system), Some(8));
    let missing = svc
        .lookup_stock(3, &StockKey::Code("none".to_string()))
        .await
        .expect("lookup");
    assert!(missing.is_none());
}

#[tokio::test]
async fn error_statuses_map_to_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revisions/12/finalize"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/revisions/12"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/revisions/12/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let svc = client(&server);
    assert!(matches!(
        svc.finalize(&session()).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert!(matches!(
        svc.delete_revision(&session()).await,
        Err(ServiceError::Status { status: 500, detail }) if detail == "db down"
    ));
    assert!(matches!(svc.list_items(&session()).await, Err(ServiceError::Parse(_))));
}

#[tokio::test]
async fn missing_credential_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let svc = HttpRevisionService::with_http_client(&server.uri(), Arc::new(LoggedOut), reqwest::Client::new());
    assert!(matches!(
        svc.open_revision(12).await,
        Err(ServiceError::Unauthorized(_))
    ));
}

#[test]
fn blank_base_url_is_rejected() {
    let err = HttpRevisionService::new(&ServiceConfig::new("  "), Arc::new(StaticToken("t".to_string())))
        .expect_err("invalid");
    assert!(matches!(err, ServiceError::InvalidConfig(_)));
}

#[test]
fn config_defaults_fill_missing_fields() {
    let cfg: ServiceConfig = serde_json::from_value(json!({ "base_url": "http://x" })).expect("config");
    assert_eq!(cfg.timeout_ms, 30_000);
    assert!(cfg.user_agent.starts_with("stockcount/"));
}
