//! Route handlers and router assembly.

use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use agentmesh_tools::registry::DependencyContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Deserialize)]
struct McpRequest {
    method: String,
    params: McpParams,
}

#[derive(Deserialize)]
struct McpParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Serialize)]
struct McpResponse {
    content: Vec<McpContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

#[derive(Serialize)]
struct McpContent {
    #[serde(rename = "type")]
    content_type: &'static str,
    text: String,
}

impl McpResponse {
    fn success(value: &Value) -> Self {
        let text = serde_json::to_string(value).unwrap_or_default();
        Self {
            content: vec![McpContent { content_type: "text", text }],
            is_error: false,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent { content_type: "text", text: message.into() }],
            is_error: true,
        }
    }
}

/// Builds the router every agent process serves its tools from.
///
/// `enable_docs` mirrors the optional `/docs` and `/redoc` surfaces a
/// development deployment may want but a production one may choose to
/// disable.
#[must_use]
pub fn build_router(state: AppState, enable_docs: bool) -> Router {
    let mut router = Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/livez", get(livez_handler))
        .route("/metrics", get(metrics_handler));

    if enable_docs {
        router = router
            .route("/docs", get(docs_handler))
            .route("/redoc", get(docs_handler));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}

async fn mcp_handler(
    State(state): State<AppState>,
    Json(request): Json<McpRequest>,
) -> impl IntoResponse {
    if request.method != "tools/call" {
        warn!(method = %request.method, "unsupported mcp method");
        return (
            StatusCode::BAD_REQUEST,
            Json(McpResponse::failure(format!(
                "unsupported method `{}`, expected `tools/call`",
                request.method
            ))),
        );
    }

    let started = Instant::now();
    let function_name = request.params.name;
    let deps = DependencyContext::new(state.injector.clone());
    let result = state
        .store
        .invoke_with_deps(&function_name, request.params.arguments, deps)
        .await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(value) => {
            state.metrics.observe_call(&function_name, "success", elapsed);
            (StatusCode::OK, Json(McpResponse::success(&value)))
        }
        Err(err) => {
            state.metrics.observe_call(&function_name, "error", elapsed);
            info!(function_name, error = %err, "tool invocation failed");
            (StatusCode::OK, Json(McpResponse::failure(err.to_string())))
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn livez_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.metrics.render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn docs_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools = state.store.get_tools();
    let mut rows = String::new();
    for tool in tools {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            tool.function_name(),
            tool.capability(),
            tool.version()
        ));
    }
    Html(format!(
        "<html><head><title>agent tools</title></head><body>\
         <h1>Registered tools</h1>\
         <table border=\"1\"><tr><th>function</th><th>capability</th><th>version</th></tr>\n{rows}</table>\
         </body></html>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_tools::registry::{DecoratorStore, ToolMetadata};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn build_test_router() -> Router {
        let store = Arc::new(DecoratorStore::new());
        store
            .register_tool(
                ToolMetadata::new("echo", "echo_service", "1.0.0").unwrap(),
                |input: Value| async move { Ok(input) },
            )
            .unwrap();
        build_router(AppState::new(store), true)
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let router = build_test_router().await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_is_503_until_flipped() {
        let store = Arc::new(DecoratorStore::new());
        let state = AppState::new(store);
        let router = build_router(state.clone(), false);

        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.set_ready();
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mcp_invokes_registered_tool() {
        let router = build_test_router().await;
        let body = serde_json::json!({
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"value": 42}}
        });
        let response = router
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mcp_unknown_method_is_bad_request() {
        let router = build_test_router().await;
        let body = serde_json::json!({
            "method": "tools/list",
            "params": {"name": "echo", "arguments": {}}
        });
        let response = router
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
