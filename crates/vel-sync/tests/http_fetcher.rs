//! HttpFetcher and SyncOrchestrator against an in-process backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use vel_cache::{CacheDatabase, CacheStore};
use vel_sync::{
    CollectionOutcome, HttpFetcher, RemoteFetcher, SyncError, SyncOrchestratorBuilder,
    SyncSettings,
};

// =============================================================================
// Fake backend
// =============================================================================

#[derive(Default)]
struct Backend {
    /// collection -> records returned by /api/sync/check
    updates: HashMap<String, Vec<Value>>,
    /// (collection, id) -> record returned by /api/sync/item
    items: HashMap<(String, String), Value>,
    /// every request seen: (query or path, x-client-id, authorization)
    requests: Vec<(String, Option<String>, Option<String>)>,
}

type Shared = Arc<Mutex<Backend>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn check(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let collection = params.get("collection").cloned().unwrap_or_default();
    let since = params.get("since").cloned().unwrap_or_default();

    let mut backend = backend.lock().unwrap();
    backend.requests.push((
        format!("check:{collection}:{since}"),
        header(&headers, "x-client-id"),
        header(&headers, "authorization"),
    ));

    match collection.as_str() {
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => "<html>not json</html>".into_response(),
        _ => Json(backend.updates.get(&collection).cloned().unwrap_or_default()).into_response(),
    }
}

async fn item(
    State(backend): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let mut backend = backend.lock().unwrap();
    backend
        .requests
        .push((format!("item:{collection}:{id}"), None, None));

    match backend.items.get(&(collection, id)) {
        Some(record) => Json(record.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_backend(backend: Shared) -> String {
    let app = Router::new()
        .route("/api/sync/check", get(check))
        .route("/api/sync/item/{collection}/{id}", get(item))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

// =============================================================================
// Fetcher
// =============================================================================

#[tokio::test]
async fn test_fetch_since_sends_query_and_headers() {
    let backend: Shared = Arc::default();
    backend.lock().unwrap().updates.insert(
        "banners".into(),
        vec![
            json!({"id": "b1", "version": 2, "title": "Pongal"}),
            json!({"id": "b2", "version": 5, "deleted": true}),
        ],
    );
    let base = spawn_backend(backend.clone()).await;

    let fetcher = HttpFetcher::new(&base, "client-42", Some("anon-key")).unwrap();
    let records = fetcher.fetch_since("banners", 1_700_000_000_000).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].field("title"), Some(&json!("Pongal")));
    assert!(records[1].deleted);

    let requests = backend.lock().unwrap().requests.clone();
    assert_eq!(
        requests,
        vec![(
            "check:banners:1700000000000".to_string(),
            Some("client-42".to_string()),
            Some("Bearer anon-key".to_string()),
        )]
    );
}

#[tokio::test]
async fn test_fetch_since_error_statuses() {
    let base = spawn_backend(Arc::default()).await;
    let fetcher = HttpFetcher::new(&base, "client-42", None).unwrap();

    let err = fetcher.fetch_since("broken", 0).await.unwrap_err();
    assert!(matches!(err, SyncError::HttpStatus { status: 500, .. }));
    assert!(err.is_retryable());

    let err = fetcher.fetch_since("garbled", 0).await.unwrap_err();
    assert!(matches!(err, SyncError::DeserializationFailed(_)));

    assert!(fetcher.fetch_since("unknown", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_one() {
    let backend: Shared = Arc::default();
    backend.lock().unwrap().items.insert(
        ("wallpapers".into(), "w-1".into()),
        json!({"id": "w-1", "version": 7, "url": "https://cdn/w-1.jpg"}),
    );
    let base = spawn_backend(backend).await;
    let fetcher = HttpFetcher::new(&base, "client-42", None).unwrap();

    let record = fetcher.fetch_one("wallpapers", "w-1").await.unwrap().unwrap();
    assert_eq!(record.version, 7);

    assert!(fetcher.fetch_one("wallpapers", "w-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_backend_is_retryable() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFetcher::new(&format!("http://{addr}"), "client-42", None).unwrap();
    let err = fetcher.fetch_since("banners", 0).await.unwrap_err();
    assert!(err.is_retryable());
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_orchestrator_over_http_and_sqlite() {
    let backend: Shared = Arc::default();
    backend.lock().unwrap().updates.insert(
        "media".into(),
        vec![
            json!({"id": "m1", "version": 1, "title": "Suprabhatam"}),
            json!({"id": "m2", "version": 1, "title": "Hanuman Chalisa"}),
        ],
    );
    let base = spawn_backend(backend.clone()).await;

    let db = CacheDatabase::in_memory().await.unwrap();
    let cache = Arc::new(CacheStore::new(db.kv_store("tablet")));
    let orchestrator = SyncOrchestratorBuilder::new(SyncSettings::with_collections(["media"]))
        .with_cache(cache)
        .with_fetcher(Arc::new(HttpFetcher::new(&base, "tablet", None).unwrap()))
        .build()
        .await
        .unwrap();

    let first = orchestrator.sync_all().await;
    assert!(first.all_succeeded());
    assert_eq!(orchestrator.get_cached_data("media").await.len(), 2);
    let checkpoint = orchestrator.last_sync_timestamp();
    assert!(checkpoint > 0);

    // The backend now reports one update and one deletion.
    backend.lock().unwrap().updates.insert(
        "media".into(),
        vec![
            json!({"id": "m1", "version": 2, "title": "Suprabhatam (remastered)"}),
            json!({"id": "m2", "version": 2, "deleted": true}),
        ],
    );
    let outcome = orchestrator.sync_collection("media").await;
    assert!(matches!(outcome, CollectionOutcome::Merged { total: 1, .. }));

    let requests = backend.lock().unwrap().requests.clone();
    assert_eq!(requests[0].0, "check:media:0");
    assert_eq!(requests[1].0, format!("check:media:{checkpoint}"));

    // A fresh orchestrator over the same database sees the persisted state.
    let reopened = SyncOrchestratorBuilder::new(SyncSettings::with_collections(["media"]))
        .with_cache(Arc::new(CacheStore::new(db.kv_store("tablet"))))
        .with_fetcher(Arc::new(HttpFetcher::new(&base, "tablet", None).unwrap()))
        .build()
        .await
        .unwrap();
    assert!(reopened.last_sync_timestamp() >= checkpoint);
    let cached = reopened.get_cached_data("media").await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].field("title"), Some(&json!("Suprabhatam (remastered)")));
}
