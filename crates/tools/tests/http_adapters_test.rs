use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use kagent_tools::{
    http::HttpClient,
    llm::UnconfiguredProvider,
    tools::{grafana, prometheus, ToolRegistry},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn echo(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"status": "success", "echo": params}))
}

fn fake_prometheus() -> Router {
    Router::new()
        .route("/api/v1/series", get(echo))
        .route("/api/v1/labels", get(echo))
        .route("/api/v1/rules", get(echo))
        .route("/api/v1/metadata", get(echo))
        .route("/api/v1/alerts", get(echo))
        .route(
            "/api/v1/query",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("query").map(String::as_str) == Some("bad{") {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"status": "error", "errorType": "bad_data", "error": "parse error at char 5"})),
                    );
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "status": "success",
                        "data": {
                            "resultType": "vector",
                            "result": [{"metric": {"job": "node"}, "value": [1700000000, "1"]}]
                        },
                        "echo": params,
                    })),
                )
            }),
        )
        .route(
            "/api/v1/query_range",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({"status": "success", "echo": params}))
            }),
        )
        .route(
            "/api/v1/label/{label}/values",
            get(|Path(label): Path<String>| async move {
                Json(json!({"status": "success", "data": [format!("{}-a", label)]}))
            }),
        )
        .route(
            "/api/v1/status/buildinfo",
            get(|| async { Json(json!({"status": "success", "data": {"version": "2.53.0"}})) }),
        )
        .route(
            "/api/v1/targets",
            get(|headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({"status": "success", "auth": auth, "echo": params}))
            }),
        )
}

fn prometheus_registry(base: &str, token: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    prometheus::register(
        &mut registry,
        prometheus::Prometheus::new(HttpClient::new(format!("{}/api/v1/", base), token)),
    )
    .unwrap();
    registry
}

#[tokio::test]
async fn test_prometheus_instant_query() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry
        .invoke("prometheus_query", json!({"query": "up", "time": "2023-11-14T22:13:20Z"}))
        .await;
    assert!(result.success, "{:?}", result.error);

    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(body["data"]["resultType"], "vector");
    assert_eq!(body["echo"]["query"], "up");
    assert_eq!(body["echo"]["time"], "1700000000");
}

#[tokio::test]
async fn test_prometheus_omits_unset_params() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry.invoke("prometheus_query", json!({"query": "up"})).await;
    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert!(body["echo"].get("time").is_none());
}

#[tokio::test]
async fn test_prometheus_api_error_message() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry.invoke("prometheus_query", json!({"query": "bad{"})).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("parse error at char 5"), "{}", error);
}

#[tokio::test]
async fn test_prometheus_range_query_default_step() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry
        .invoke(
            "prometheus_query_range",
            json!({"query": "rate(x[5m])", "start": "1700000000", "end": "2023-11-14T23:13:20Z"}),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(body["echo"]["start"], "1700000000");
    assert_eq!(body["echo"]["end"], "1700003600");
    assert_eq!(body["echo"]["step"], "15s");
}

#[tokio::test]
async fn test_prometheus_label_values_path() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry.invoke("prometheus_label_values", json!({"label": "job"})).await;
    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(body["data"], json!(["job-a"]));
}

#[tokio::test]
async fn test_prometheus_bearer_token_and_enum_param() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, Some("s3cret".to_string()));

    let result = registry.invoke("prometheus_targets", json!({"state": "dropped"})).await;
    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(body["auth"], "Bearer s3cret");
    assert_eq!(body["echo"]["state"], "dropped");
}

async fn echoed(registry: &ToolRegistry, tool: &str, args: Value) -> Value {
    let result = registry.invoke(tool, args).await;
    assert!(result.success, "{} failed: {:?}", tool, result.error);
    let body: Value = serde_json::from_str(&result.output).unwrap();
    body["echo"].clone()
}

#[tokio::test]
async fn test_prometheus_selector_endpoints_send_match() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let echo = echoed(
        &registry,
        "prometheus_series",
        json!({"match": "up{job=\"node\"}", "start": "1700000000"}),
    )
    .await;
    assert_eq!(echo["match[]"], "up{job=\"node\"}");
    assert_eq!(echo["start"], "1700000000");
    assert!(echo.get("end").is_none());

    let echo = echoed(&registry, "prometheus_label_names", json!({"match": "up"})).await;
    assert_eq!(echo, json!({"match[]": "up"}));

    let echo = echoed(&registry, "prometheus_label_names", Value::Null).await;
    assert_eq!(echo, json!({}));
}

#[tokio::test]
async fn test_prometheus_rules_metadata_alerts() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let echo = echoed(&registry, "prometheus_rules", json!({"type": "alert"})).await;
    assert_eq!(echo, json!({"type": "alert"}));

    let echo = echoed(&registry, "prometheus_metadata", json!({"metric": "http_requests_total", "limit": 5})).await;
    assert_eq!(echo["metric"], "http_requests_total");
    assert_eq!(echo["limit"], "5");

    let echo = echoed(&registry, "prometheus_alerts", Value::Null).await;
    assert_eq!(echo, json!({}));
}

#[tokio::test]
async fn test_prometheus_label_values_stays_on_label_route() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry
        .invoke("prometheus_label_values", json!({"label": "../status/buildinfo#"}))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Validation error"));
}

#[tokio::test]
async fn test_is_prometheus_installed() {
    let base = spawn(fake_prometheus()).await;
    let registry = prometheus_registry(&base, None);

    let result = registry.invoke("is_prometheus_installed", Value::Null).await;
    assert_eq!(result.output, "Prometheus is installed: 2.53.0");
}

fn fake_grafana() -> Router {
    Router::new().route(
        "/api/dashboards/db",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            if headers.get("authorization").is_none() {
                return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "uid": body["dashboard"]["uid"],
                    "received": body,
                })),
            )
        }),
    )
}

fn grafana_registry(base: &str, api_key: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    grafana::register(
        &mut registry,
        grafana::Grafana::new(
            HttpClient::new(format!("{}/api", base), api_key),
            Arc::new(UnconfiguredProvider::new("no model in tests")),
            Some("ops".to_string()),
        ),
    )
    .unwrap();
    registry
}

#[tokio::test]
async fn test_grafana_create_dashboard() {
    let base = spawn(fake_grafana()).await;
    let registry = grafana_registry(&base, Some("glsa_token".to_string()));

    let dashboard = json!({"id": null, "uid": "cpu-1", "title": "CPU"}).to_string();
    let result = registry.invoke("create_dashboard", json!({"dashboard": dashboard})).await;
    assert!(result.success, "{:?}", result.error);

    let body: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(body["uid"], "cpu-1");
    assert_eq!(body["received"]["overwrite"], true);
    assert_eq!(body["received"]["folderUid"], "ops");
    assert_eq!(body["received"]["dashboard"]["title"], "CPU");
}

#[tokio::test]
async fn test_grafana_error_uses_message_field() {
    let base = spawn(fake_grafana()).await;
    let registry = grafana_registry(&base, None);

    let result = registry
        .invoke("create_dashboard", json!({"dashboard": "{\"title\": \"x\"}"}))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Unauthorized"));
}

#[tokio::test]
async fn test_generate_dashboard_without_model_returns_error_text() {
    let registry = grafana_registry("http://127.0.0.1:1", None);
    let result = registry
        .invoke("generate_dashboard_json", json!({"user_query": "latency by route"}))
        .await;
    assert!(result.success);
    assert_eq!(
        result.output,
        "Error generating grafana dashboard json: LLM error: no model in tests"
    );
}
