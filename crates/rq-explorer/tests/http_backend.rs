//! HTTP contract of the search service, checked against a local axum stub.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use rq_core::wire::{AggregateRequest, SearchRequest, TimelineRequest};
use rq_core::{FieldFilter, FilterOperator, QueryState, SortOrder, TimeRange};
use rq_explorer::{Explorer, FetchError, HttpBackend, SearchBackend};

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

impl Captured {
    fn record(&self, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth.lock().unwrap().push(auth);
        self.bodies.lock().unwrap().push(body);
    }
}

async fn query(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.record(&headers, body.clone());
    let from = body["from"].as_u64().unwrap_or(0);
    Json(json!({
        "hits": [
            {"_id": format!("doc-{}", from), "@timestamp": "2024-05-01T10:00:00Z",
             "source": {"parser": "parse_mft"}, "message": "File: cmd.exe",
             "event": {"type": "file"}}
        ],
        "total": {"value": 137, "relation": "eq"},
        "took": 4
    }))
}

async fn aggregate(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    captured.record(&headers, body.clone());
    if body["field"] == "broken" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Aggregation failed: field not aggregatable"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "aggregations": {"top_values": {"buckets": [
                {"key": "file", "doc_count": 120},
                {"key": "process", "doc_count": 17}
            ]}}
        })),
    )
}

async fn timeline(State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    captured.record(&headers, body);
    Json(json!({
        "interval": "1h",
        "buckets": [{"timestamp": "2024-05-01T10:00:00Z", "count": 137}],
        "total": 137
    }))
}

async fn stats(
    headers: HeaderMap,
    Path(case_id): Path<String>,
    State(captured): State<Captured>,
) -> (StatusCode, Json<Value>) {
    captured.record(&headers, Value::Null);
    if case_id != "CASE-1" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("Index for case {} not found", case_id)})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "case_id": "CASE-1",
            "index_name": "case_case-1",
            "document_count": 137,
            "size_bytes": 524288,
            "shard_count": 1,
            "replica_count": 0
        })),
    )
}

async fn serve() -> (SocketAddr, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/search/query", post(query))
        .route("/api/search/aggregate", post(aggregate))
        .route("/api/search/timeline", post(timeline))
        .route("/api/search/stats/:case_id", get(stats))
        .with_state(captured.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, captured)
}

fn backend(addr: SocketAddr, key: Option<&str>) -> HttpBackend {
    HttpBackend::new(
        format!("http://{}/api/", addr),
        key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_search_contract() {
    let (addr, captured) = serve().await;
    let backend = backend(addr, Some("secret"));

    let resp = backend
        .search(SearchRequest {
            query: "*".into(),
            case_id: "CASE-1".into(),
            size: 25,
            from: 25,
            sort_by: "@timestamp".into(),
            sort_order: SortOrder::Desc,
            field_filters: vec![FieldFilter {
                field: "user.name".into(),
                operator: FilterOperator::Exists,
                value: None,
            }],
            time_range: Some(TimeRange::new(Some("2024-05-01T00:00:00Z".into()), None)),
        })
        .await
        .unwrap();
    assert_eq!(resp.total, 137);
    assert_eq!(resp.hits.len(), 1);

    let body = captured.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["from"], 25);
    assert_eq!(body["case_id"], "CASE-1");
    assert_eq!(body["field_filters"][0]["operator"], "exists");
    assert_eq!(body["field_filters"][0]["value"], Value::Null);
    assert_eq!(body["time_range"], json!({"gte": "2024-05-01T00:00:00Z"}));
    assert_eq!(
        captured.auth.lock().unwrap()[0].as_deref(),
        Some("Bearer secret")
    );
}

#[tokio::test]
async fn test_detail_becomes_backend_error() {
    let (addr, captured) = serve().await;
    let backend = backend(addr, None);

    let err = backend
        .aggregate(AggregateRequest {
            case_id: "CASE-1".into(),
            field: "broken".into(),
            size: 10,
            query: "*".into(),
            field_filters: Vec::new(),
            time_range: None,
        })
        .await
        .unwrap_err();
    match err {
        FetchError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Aggregation failed: field not aggregatable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(captured.auth.lock().unwrap()[0], None);
}

#[tokio::test]
async fn test_named_aggregation_and_timeline_decode() {
    let (addr, _captured) = serve().await;
    let backend = backend(addr, None);

    let aggs = backend
        .aggregate(AggregateRequest {
            case_id: "CASE-1".into(),
            field: "event.type".into(),
            size: 10,
            query: "*".into(),
            field_filters: Vec::new(),
            time_range: None,
        })
        .await
        .unwrap();
    assert_eq!(aggs.buckets[0].key, "file");
    assert_eq!(aggs.buckets[0].count, 120);

    let timeline = backend
        .timeline(TimelineRequest {
            case_id: "CASE-1".into(),
            interval: "1h".into(),
            time_field: "@timestamp".into(),
            query: "*".into(),
            field_filters: Vec::new(),
            time_range: None,
        })
        .await
        .unwrap();
    assert_eq!(timeline.buckets.len(), 1);
    assert_eq!(timeline.buckets[0].count, 137);
}

#[tokio::test]
async fn test_index_stats() {
    let (addr, captured) = serve().await;
    let backend = backend(addr, Some("secret"));

    let stats = backend.stats("CASE-1").await.unwrap();
    assert_eq!(stats.document_count, 137);
    assert_eq!(stats.size_bytes, 524288);
    assert_eq!(stats.index_name, "case_case-1");
    assert_eq!(
        captured.auth.lock().unwrap()[0].as_deref(),
        Some("Bearer secret")
    );

    match backend.stats("CASE-404").await.unwrap_err() {
        FetchError::Backend { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Index for case CASE-404 not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_explorer_over_http() {
    let (addr, captured) = serve().await;
    let state = QueryState {
        case_id: Some("CASE-1".into()),
        ..QueryState::default()
    };
    let mut explorer = Explorer::new(Arc::new(backend(addr, Some("secret"))), state);
    explorer.settle().await;

    assert_eq!(explorer.total(), 137);
    assert_eq!(explorer.page_info(), "1-25 / 137");
    assert_eq!(explorer.state().aggregation_field.as_deref(), Some("_id"));
    assert_eq!(explorer.buckets().len(), 2);
    assert_eq!(explorer.search_error(), None);
    assert_eq!(captured.bodies.lock().unwrap().len(), 2);
}
