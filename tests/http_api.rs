use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use bson::doc;
use serde_json::{Value, json};
use tower::ServiceExt;

use eshop_api::config::AppConfig;
use eshop_api::errors::ApiError;
use eshop_api::health::StoreHealth;
use eshop_api::query::{Filter, UpdateDoc};
use eshop_api::server::{AppState, GREETING, router};
use eshop_api::store::{DocumentStore, MemoryStore};
use eshop_api::types::{Document, InsertResult, UpdateResult};

/// Counts every store call, delegating to a `MemoryStore`.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl DocumentStore for CountingStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateResult, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_one(collection, filter, update).await
    }
}

/// Fails every call until `healthy` is set.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    healthy: std::sync::atomic::AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), ApiError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::StoreUnavailable("connection reset".into()))
        }
    }
}

impl DocumentStore for FlakyStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, ApiError> {
        self.check()?;
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, ApiError> {
        self.check().map_err(|_| ApiError::StoreWrite("not writable".into()))?;
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateResult, ApiError> {
        self.check().map_err(|_| ApiError::StoreWrite("not writable".into()))?;
        self.inner.update_one(collection, filter, update).await
    }
}

fn seed_catalog(store: &MemoryStore) {
    store.seed(
        "Programs",
        [
            doc! {
                "id": 1, "title": "Beach Camp", "location": "Nice",
                "price": 120, "availableSpaces": 8,
            },
            doc! {
                "id": 2, "title": "City120 Tour", "location": "Berlin",
                "price": 40, "availableSpaces": 3,
            },
        ],
    );
}

fn build_app<S: DocumentStore>(store: Arc<S>, cfg: &AppConfig) -> (Router, Arc<StoreHealth>) {
    let state = AppState::new(store, &cfg.store);
    let health = Arc::clone(&state.health);
    (router(state, cfg).unwrap(), health)
}

fn memory_app() -> Router {
    let store = MemoryStore::new();
    seed_catalog(&store);
    build_app(Arc::new(store), &AppConfig::default()).0
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_origin(uri: &str, origin: &str) -> Request<Body> {
    Request::get(uri).header(header::ORIGIN, origin).body(Body::empty()).unwrap()
}

fn titles(body: &Value) -> Vec<&str> {
    body.as_array().unwrap().iter().map(|d| d["title"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn root_greets() {
    let res = memory_app().oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], GREETING.as_bytes());
}

#[tokio::test]
async fn list_programs_returns_catalog_with_hex_ids() {
    let (status, body) = call(&memory_app(), get("/programs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Beach Camp", "City120 Tour"]);
    assert_eq!(body[0]["_id"].as_str().unwrap().len(), 24);
    assert_eq!(body[0]["price"], json!(120));
}

#[tokio::test]
async fn posted_order_shows_up_in_listing() {
    let app = memory_app();
    let order = json!({"orderNo": 7, "item": "A"});
    let (status, body) = call(&app, with_json("POST", "/orders", &order)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], json!(true));
    assert!(body["insertedId"].is_string());

    let (status, orders) = call(&app, get("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["orderNo"], json!(7));
    assert_eq!(orders[0]["item"], json!("A"));
    assert_eq!(orders[0]["_id"], body["insertedId"]);
}

#[tokio::test]
async fn update_of_unknown_order_is_404_with_result() {
    let app = memory_app();
    call(&app, with_json("POST", "/orders", &json!({"orderNo": 1}))).await;
    let patch = json!({"status": "paid"});
    let (status, body) = call(&app, with_json("PUT", "/orders/99", &patch)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["matchedCount"], json!(0));
    assert_eq!(body["modifiedCount"], json!(0));
    assert_eq!(body["error"], json!("Order not found"));
}

#[tokio::test]
async fn update_order_merges_patch() {
    let app = memory_app();
    call(&app, with_json("POST", "/orders", &json!({"orderNo": 3, "item": "B", "qty": 1}))).await;
    let (status, body) = call(&app, with_json("PUT", "/orders/3", &json!({"qty": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], json!(1));
    assert_eq!(body["modifiedCount"], json!(1));
    assert!(body.get("error").is_none());

    let (_, orders) = call(&app, get("/orders")).await;
    assert_eq!(orders[0]["qty"], json!(2));
    assert_eq!(orders[0]["item"], json!("B"));
}

#[tokio::test]
async fn price_patch_changes_only_price() {
    let app = memory_app();
    let (_, before) = call(&app, get("/programs")).await;
    let (status, body) = call(&app, with_json("PUT", "/programs/1", &json!({"price": 50}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], json!(1));

    let (_, after) = call(&app, get("/programs")).await;
    let mut expected = before[0].clone();
    expected["price"] = json!(50);
    assert_eq!(after[0], expected);
    assert_eq!(after[1], before[1]);
}

#[tokio::test]
async fn same_value_patch_matches_without_modifying() {
    let app = memory_app();
    let (status, body) = call(&app, with_json("PUT", "/programs/2", &json!({"price": 40}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], json!(1));
    assert_eq!(body["modifiedCount"], json!(0));
}

#[tokio::test]
async fn non_numeric_key_is_404_without_store_access() {
    let store = Arc::new(CountingStore::default());
    seed_catalog(&store.inner);
    let (app, _) = build_app(Arc::clone(&store), &AppConfig::default());
    let (status, body) = call(&app, with_json("PUT", "/programs/abc", &json!({"price": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["matchedCount"], json!(0));
    assert_eq!(body["error"], json!("Program not found"));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn numeric_search_only_looks_at_numeric_fields() {
    let app = memory_app();
    let (status, body) = call(&app, get("/search?term=120")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Beach Camp"]);

    let (_, body) = call(&app, get("/search?term=city120")).await;
    assert_eq!(titles(&body), vec!["City120 Tour"]);
}

#[tokio::test]
async fn text_search_is_case_insensitive_over_title_and_location() {
    let app = memory_app();
    let (_, body) = call(&app, get("/search?term=BERLIN")).await;
    assert_eq!(titles(&body), vec!["City120 Tour"]);
    let (_, body) = call(&app, get("/search?term=camp")).await;
    assert_eq!(titles(&body), vec!["Beach Camp"]);
    let (_, body) = call(&app, get("/search?term=%28")).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_without_term_is_400_without_store_access() {
    let store = Arc::new(CountingStore::default());
    let (app, health) = build_app(Arc::clone(&store), &AppConfig::default());
    for uri in ["/search", "/search?term=", "/search?other=1"] {
        let (status, body) = call(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], json!("invalid_query"));
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(!health.is_tripped());
}

#[tokio::test]
async fn read_failure_is_500_and_trips_default_health() {
    let (app, health) = build_app(Arc::new(FlakyStore::default()), &AppConfig::default());
    let (status, body) = call(&app, get("/programs")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to fetch items", "code": "store_unavailable"}));
    assert!(health.is_tripped());
}

#[tokio::test]
async fn insert_failure_reports_write_code() {
    let (app, health) = build_app(Arc::new(FlakyStore::default()), &AppConfig::default());
    let (status, body) = call(&app, with_json("POST", "/orders", &json!({"orderNo": 1}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to create order", "code": "store_write_failed"}));
    assert!(health.is_tripped());
}

#[tokio::test]
async fn update_failure_does_not_count_toward_shutdown() {
    let (app, health) = build_app(Arc::new(FlakyStore::default()), &AppConfig::default());
    let (status, body) = call(&app, with_json("PUT", "/orders/1", &json!({"x": 1}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Operation Failed!"));
    assert!(!health.is_tripped());
    assert_eq!(health.consecutive_failures(), 0);
}

#[tokio::test]
async fn success_resets_failure_run() {
    let mut cfg = AppConfig::default();
    cfg.store.max_consecutive_failures = 2;
    let store = Arc::new(FlakyStore::default());
    let (app, health) = build_app(Arc::clone(&store), &cfg);

    call(&app, get("/orders")).await;
    assert_eq!(health.consecutive_failures(), 1);
    store.healthy.store(true, Ordering::SeqCst);
    let (status, _) = call(&app, get("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.consecutive_failures(), 0);

    store.healthy.store(false, Ordering::SeqCst);
    call(&app, get("/orders")).await;
    assert!(!health.is_tripped());
    call(&app, get("/orders")).await;
    assert!(health.is_tripped());
}

#[tokio::test]
async fn search_failure_is_500_but_never_trips() {
    let (app, health) = build_app(Arc::new(FlakyStore::default()), &AppConfig::default());
    for _ in 0..3 {
        let (status, body) = call(&app, get("/search?term=camp")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Failed to search programs"));
        assert_eq!(body["code"], json!("store_unavailable"));
    }
    assert!(!health.is_tripped());
    assert_eq!(health.consecutive_failures(), 0);
}

#[tokio::test]
async fn nul_search_term_is_400_without_store_access() {
    let store = Arc::new(CountingStore::default());
    let (app, health) = build_app(Arc::clone(&store), &AppConfig::default());
    for uri in ["/search?term=%00", "/search?term=camp%00", "/search?term=%0012"] {
        let (status, body) = call(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], json!("invalid_query"));
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(!health.is_tripped());
}

#[tokio::test]
async fn hex_key_addresses_the_same_program() {
    let app = memory_app();
    let (status, body) = call(&app, with_json("PUT", "/programs/0x2", &json!({"price": 41}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], json!(1));
    let (_, programs) = call(&app, get("/programs")).await;
    assert_eq!(programs[1]["price"], json!(41));
}

#[tokio::test]
async fn patch_through_a_scalar_is_500_and_leaves_the_order() {
    let app = memory_app();
    let order = json!({"orderNo": 4, "customer": "Ana", "qty": 1});
    call(&app, with_json("POST", "/orders", &order)).await;

    let patch = json!({"qty": 2, "customer.name": "Bea"});
    let (status, body) = call(&app, with_json("PUT", "/orders/4", &patch)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Operation Failed!", "code": "store_write_failed"}));

    let (status, body) = call(&app, with_json("PUT", "/orders/4", &json!({"$set": 1}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("store_write_failed"));

    let (_, orders) = call(&app, get("/orders")).await;
    assert_eq!(orders[0]["qty"], json!(1));
    assert_eq!(orders[0]["customer"], json!("Ana"));
}

#[tokio::test]
async fn assets_are_served_under_prefix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("camp.txt"), "tent").unwrap();
    let mut cfg = AppConfig::default();
    cfg.assets.dir = Some(dir.path().to_path_buf());
    let (app, _) = build_app(Arc::new(MemoryStore::new()), &cfg);

    let res = app.clone().oneshot(get("/images/camp.txt")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"tent");

    let (status, body) = call(&app, get("/images/missing.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Image not found", "code": "not_found"}));
}

#[test]
fn unmountable_assets_prefix_is_a_config_error() {
    for prefix in ["/", "", "images"] {
        let mut cfg = AppConfig::default();
        cfg.assets.dir = Some(std::env::temp_dir());
        cfg.assets.prefix = prefix.to_string();
        let state = AppState::new(Arc::new(MemoryStore::new()), &cfg.store);
        let err = router(state, &cfg).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)), "{prefix:?}: {err}");
    }
}

#[tokio::test]
async fn cors_allow_list_echoes_allowed_origin() {
    let mut cfg = AppConfig::default();
    cfg.server.cors_origins = vec!["http://shop.test".to_string()];
    let (app, _) = build_app(Arc::new(MemoryStore::new()), &cfg);

    let res = app.clone().oneshot(with_origin("/", "http://shop.test")).await.unwrap();
    assert_eq!(
        res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://shop.test"
    );

    let res = app.oneshot(with_origin("/", "http://evil.test")).await.unwrap();
    assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn cors_defaults_to_any_origin() {
    let res = memory_app().oneshot(with_origin("/programs", "http://anywhere.test")).await.unwrap();
    assert_eq!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
}
