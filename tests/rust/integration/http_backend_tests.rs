//! `HttpBackend` against an in-process axum app mimicking the Deita API.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use deita::backend::{BackendError, Cell, HttpBackend, QueryBackend};
use deita::config::ClientConfig;
use serde_json::{json, Value};
use uuid::Uuid;

const TOKEN: &str = "test-token";

async fn query(Json(body): Json<Value>) -> impl IntoResponse {
    let text = body["query"].as_str().unwrap_or_default().to_string();
    if text.contains("missing_table") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Table 'missing_table' does not exist in the workspace." })),
        );
    }
    if body["count"].as_bool().unwrap_or(false) {
        return (
            StatusCode::OK,
            Json(json!({ "columns": ["count"], "rows": [[1500]], "has_more": false, "time": 0.01 })),
        );
    }
    let page = body["page"].as_u64().unwrap_or(1);
    (
        StatusCode::OK,
        Json(json!({
            "columns": ["page", "label", "note"],
            "rows": [[page, "first", null], [page, "second", "x"]],
            "has_more": page < 3,
            "time": 0.02
        })),
    )
}

async fn export(Json(body): Json<Value>) -> impl IntoResponse {
    let text = body["query"].as_str().unwrap_or_default();
    (
        [("content-type", "text/csv")],
        format!("query\n\"{}\"\n", text.replace('"', "\"\"")),
    )
}

async fn save(Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default();
    if name.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{ "loc": ["body", "name"], "msg": "String should have at least 1 character" }] })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "0b6b7c1e-2f43-4a56-9d0e-8b1c2d3e4f50",
            "name": name,
            "query": body["query"],
            "created_at": "2024-03-09T14:05:07Z"
        })),
    )
}

async fn list_queries() -> Json<Value> {
    Json(json!([{
        "id": "0b6b7c1e-2f43-4a56-9d0e-8b1c2d3e4f50",
        "name": "Q1",
        "query": "SELECT 1",
        "created_at": "2024-03-09T14:05:07Z"
    }]))
}

async fn delete_query(Path((_, id)): Path<(String, Uuid)>) -> StatusCode {
    if id.is_nil() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn files(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Not authenticated" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([{
            "id": "6f1c2a54-8d0e-4d7c-9a51-2f4b8e9c0d11",
            "table_name": "orders",
            "filename": "orders.csv",
            "size": 2048,
            "uploaded_at": "2024-03-01T09:00:00Z"
        }])),
    )
}

async fn spawn_api() -> String {
    let app = Router::new()
        .route("/v1/workspaces/{ws}/query", post(query))
        .route("/v1/workspaces/{ws}/query/export", post(export))
        .route("/v1/workspaces/{ws}/queries", post(save).get(list_queries))
        .route("/v1/workspaces/{ws}/queries/{id}", delete(delete_query))
        .route("/v1/workspaces/{ws}/files/", get(files));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1/", addr)
}

async fn backend(token: Option<&str>) -> HttpBackend {
    let mut config = ClientConfig::new(spawn_api().await, Uuid::new_v4());
    config.api_token = token.map(str::to_string);
    config.request_timeout_secs = 5;
    HttpBackend::new(&config).unwrap()
}

#[tokio::test]
async fn test_execute_page() {
    let backend = backend(None).await;
    let result = backend.execute_page("SELECT * FROM orders", 2).await.unwrap();

    assert_eq!(result.columns, vec!["page", "label", "note"]);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0][0], Cell::from(2i64));
    assert!(result.rows[0][2].is_null());
    assert!(result.has_more);
}

#[tokio::test]
async fn test_execute_count() {
    let backend = backend(None).await;
    let result = backend.execute_count("SELECT * FROM orders").await.unwrap();
    assert_eq!(result.count_value(), Some(1500));
}

#[tokio::test]
async fn test_error_detail_is_surfaced() {
    let backend = backend(None).await;
    let err = backend
        .execute_page("SELECT * FROM missing_table", 1)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::status(400, "Table 'missing_table' does not exist in the workspace.")
    );
}

#[tokio::test]
async fn test_export_returns_raw_bytes() {
    let backend = backend(None).await;
    let blob = backend.export_csv("SELECT \"a\"").await.unwrap();
    assert_eq!(&blob[..], b"query\n\"SELECT \"\"a\"\"\"\n");
}

#[tokio::test]
async fn test_saved_queries_round_trip() {
    let backend = backend(None).await;

    let saved = backend.save_query("Q1", "SELECT 1").await.unwrap();
    assert_eq!(saved.name, "Q1");
    assert_eq!(saved.query, "SELECT 1");

    let listed = backend.list_saved_queries().await.unwrap();
    assert_eq!(listed, vec![saved.clone()]);

    backend.delete_saved_query(saved.id).await.unwrap();
    let err = backend.delete_saved_query(Uuid::nil()).await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_validation_detail_list() {
    let backend = backend(None).await;
    let err = backend.save_query("", "SELECT 1").await.unwrap_err();
    assert_eq!(
        err,
        BackendError::status(422, "String should have at least 1 character")
    );
}

#[tokio::test]
async fn test_files_require_token() {
    let anonymous = backend(None).await;
    let err = anonymous.list_files().await.unwrap_err();
    assert_eq!(err, BackendError::status(401, "Not authenticated"));

    let authorized = backend(Some(TOKEN)).await;
    let files = authorized.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].table_name, "orders");
    assert!(files[0].columns.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(format!("http://{}/v1", addr), Uuid::new_v4());
    let backend = HttpBackend::new(&config).unwrap();
    let err = backend.execute_page("SELECT 1", 1).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}
