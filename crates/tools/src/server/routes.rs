use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::{metrics, tools::ToolRegistry};

pub async fn health(State(registry): State<Arc<ToolRegistry>>) -> Json<Value> {
    Json(json!({ "status": "healthy", "tools": registry.len() }))
}

pub async fn list_tools(State(registry): State<Arc<ToolRegistry>>) -> Response {
    Json(registry.definitions()).into_response()
}

pub async fn call_tool(
    State(registry): State<Arc<ToolRegistry>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    if registry.get(&name).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown tool '{}'", name) })),
        )
            .into_response();
    }

    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid JSON arguments: {}", e) })),
                )
                    .into_response();
            }
        }
    };
    info!("HTTP call to tool {}", name);
    let result = registry.invoke(&name, args).await;
    Json(result).into_response()
}

pub async fn metrics() -> String {
    metrics::gather_metrics()
}
