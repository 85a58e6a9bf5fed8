//! HTTP surface: router, handlers, middleware and the serve loop.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::{AppConfig, StoreConfig};
use crate::errors::{ApiError, ErrorBody};
use crate::health::StoreHealth;
use crate::json::{
    documents_to_json, insert_result_to_json, json_value_to_bson_document, update_result_to_json,
};
use crate::logger::ACCESS_TARGET;
use crate::query::SearchQuery;
use crate::repository::Repository;
use crate::store::DocumentStore;
use crate::types::{ORDER_KEY, PROGRAM_KEY};

pub const GREETING: &str = "Hello, Server Running Here!";

/// Shared per-process context handed to every handler.
pub struct AppState<S> {
    pub repo: Repository<S>,
    pub programs: Arc<str>,
    pub orders: Arc<str>,
    pub health: Arc<StoreHealth>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            programs: Arc::clone(&self.programs),
            orders: Arc::clone(&self.orders),
            health: Arc::clone(&self.health),
        }
    }
}

impl<S: DocumentStore> AppState<S> {
    pub fn new(store: Arc<S>, cfg: &StoreConfig) -> Self {
        Self {
            repo: Repository::new(store),
            programs: Arc::from(cfg.programs_collection.as_str()),
            orders: Arc::from(cfg.orders_collection.as_str()),
            health: Arc::new(StoreHealth::new(cfg.max_consecutive_failures)),
        }
    }

    /// 500 with a fixed message. With `counts`, store failures feed the health
    /// tracker; other errors never do.
    fn store_failure(&self, err: &ApiError, message: &str, counts: bool) -> Response {
        log::error!("{message}: {err}");
        if counts && err.is_store_failure() {
            self.health.record_failure();
        }
        let body = ErrorBody::new(message, err.code());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Build the application router.
///
/// # Errors
/// Returns `Config` when the assets prefix cannot be mounted.
pub fn router<S: DocumentStore>(state: AppState<S>, cfg: &AppConfig) -> Result<Router, ApiError> {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/programs", get(list_programs::<S>))
        .route("/programs/{id}", put(update_program::<S>))
        .route("/orders", get(list_orders::<S>).post(create_order::<S>))
        .route("/orders/{order_no}", put(update_order::<S>))
        .route("/search", get(search_programs::<S>))
        .with_state(state);

    if let Some(dir) = &cfg.assets.dir {
        cfg.assets.validate()?;
        let assets = ServeDir::new(dir).not_found_service(image_not_found.into_service());
        app = app.nest_service(&cfg.assets.prefix, assets);
    }

    Ok(app
        .layer(middleware::from_fn(access_log))
        .layer(build_cors_layer(&cfg.server.cors_origins)))
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let mut parsed = Vec::new();
    for origin in origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(err) => log::warn!("ignoring invalid CORS origin '{origin}': {err}"),
        }
    }
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        target: ACCESS_TARGET,
        "{method} {path} {} {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn image_not_found() -> Response {
    ApiError::NotFound("Image not found".into()).into_response()
}

async fn root() -> &'static str {
    GREETING
}

async fn list_programs<S: DocumentStore>(State(state): State<AppState<S>>) -> Response {
    match state.repo.list_all(&state.programs).await {
        Ok(docs) => {
            state.health.record_success();
            log::debug!("Here found the database");
            Json(documents_to_json(docs)).into_response()
        }
        Err(e) => state.store_failure(&e, "Failed to fetch items", true),
    }
}

async fn list_orders<S: DocumentStore>(State(state): State<AppState<S>>) -> Response {
    match state.repo.list_all(&state.orders).await {
        Ok(docs) => {
            state.health.record_success();
            Json(documents_to_json(docs)).into_response()
        }
        Err(e) => state.store_failure(&e, "Failed to fetch orders", true),
    }
}

async fn create_order<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    let doc = match json_value_to_bson_document(Value::Object(body)) {
        Ok(doc) => doc,
        Err(e) => return e.into_response(),
    };
    match state.repo.insert(&state.orders, doc).await {
        Ok(res) => {
            state.health.record_success();
            Json(insert_result_to_json(res)).into_response()
        }
        Err(e) => state.store_failure(&e, "Failed to create order", true),
    }
}

async fn update_order<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(order_no): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    update_by_key(&state, &state.orders, ORDER_KEY, &order_no, patch, "Order not found").await
}

async fn update_program<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    update_by_key(&state, &state.programs, PROGRAM_KEY, &id, patch, "Program not found").await
}

// Update failures answer 500 but never count toward shutdown.
async fn update_by_key<S: DocumentStore>(
    state: &AppState<S>,
    collection: &str,
    key_field: &str,
    key: &str,
    patch: Map<String, Value>,
    not_found: &str,
) -> Response {
    let doc = match json_value_to_bson_document(Value::Object(patch)) {
        Ok(doc) => doc,
        Err(e) => return e.into_response(),
    };
    match state.repo.update_by_key(collection, key_field, key, doc).await {
        Ok(res) if res.is_miss() => {
            log::info!("{not_found}: {key_field}={key}");
            let body = update_result_to_json(res, Some(not_found));
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        Ok(res) => {
            state.health.record_success();
            log::info!("Updated Successfully");
            Json(update_result_to_json(res, None)).into_response()
        }
        Err(e) => state.store_failure(&e, "Operation Failed!", false),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub term: Option<String>,
}

async fn search_programs<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = match SearchQuery::parse(params.term.as_deref()) {
        Ok(q) => q,
        Err(e) => return e.into_response(),
    };
    match state.repo.search(&state.programs, &query).await {
        Ok(docs) => {
            state.health.record_success();
            Json(documents_to_json(docs)).into_response()
        }
        // Search failures never count toward shutdown.
        Err(e) => state.store_failure(&e, "Failed to search programs", false),
    }
}

/// Why the serve loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    StoreTripped,
}

impl ShutdownReason {
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Signal => 0,
            Self::StoreTripped => 1,
        }
    }
}

/// Serve until ctrl-c, SIGTERM, or the store health tracker trips.
/// In-flight requests are allowed to finish either way.
///
/// # Errors
/// Returns `Io` if the listener fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    health: Arc<StoreHealth>,
) -> Result<ShutdownReason, ApiError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&health)))
        .await?;
    let reason =
        if health.is_tripped() { ShutdownReason::StoreTripped } else { ShutdownReason::Signal };
    log::info!("server stopped ({reason:?})");
    Ok(reason)
}

async fn shutdown_signal(health: Arc<StoreHealth>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("ctrl-c received, shutting down"),
        () = terminate => log::info!("SIGTERM received, shutting down"),
        () = health.wait_tripped() => log::warn!("store health tripped, shutting down"),
    }
}
