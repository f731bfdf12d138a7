//! Proxy for a dependency resolved to a tool hosted by another agent.

use async_trait::async_trait;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentmesh_core::ToolProxy;

use crate::error::ProxyError;
use crate::http_client::{build_https_client, HyperClient};

#[derive(Serialize)]
struct McpCallRequest<'a> {
    method: &'static str,
    params: McpCallParams<'a>,
}

#[derive(Serialize)]
struct McpCallParams<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Deserialize)]
struct McpCallResponse {
    #[serde(default)]
    content: Vec<McpContent>,
    #[serde(default)]
    #[serde(rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct McpContent {
    #[serde(default, rename = "type")]
    _content_type: Option<String>,
    #[serde(default)]
    text: String,
}

/// Calls a tool function hosted by another agent over HTTP, using the
/// JSON-RPC-style `{endpoint}/mcp` envelope every agent's HTTP serving layer
/// exposes. Bound at construction to one `(endpoint, function_name)` pair —
/// every call invokes that same remote function.
pub struct RemoteProxy {
    http: HyperClient,
    endpoint: String,
    function_name: String,
    capability: String,
    provider_agent_id: String,
}

impl RemoteProxy {
    /// Creates a proxy that calls `function_name` hosted at `endpoint` on
    /// behalf of `provider_agent_id`, satisfying `capability`.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        function_name: impl Into<String>,
        capability: impl Into<String>,
        provider_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            http: build_https_client(),
            endpoint: endpoint.into(),
            function_name: function_name.into(),
            capability: capability.into(),
            provider_agent_id: provider_agent_id.into(),
        }
    }

    /// Checks the provider's `/health` endpoint. Returns `false` on any
    /// transport failure or non-200 status rather than propagating an
    /// error: a failed health check is an ordinary, expected outcome here.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        let Ok(request) = Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Body::empty())
        else {
            return false;
        };

        matches!(
            self.http.request(request).await,
            Ok(response) if response.status() == StatusCode::OK
        )
    }
}

#[async_trait]
impl ToolProxy for RemoteProxy {
    fn capability(&self) -> &str {
        &self.capability
    }

    fn provider_agent_id(&self) -> &str {
        &self.provider_agent_id
    }

    async fn call(&self, arguments: Value) -> Result<Value, String> {
        let url = format!("{}/mcp", self.endpoint);
        let body = McpCallRequest {
            method: "tools/call",
            params: McpCallParams {
                name: &self.function_name,
                arguments: &arguments,
            },
        };

        let payload = serde_json::to_vec(&body).map_err(|err| {
            ProxyError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
            .to_string()
        })?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .map_err(|err| {
                ProxyError::Transport {
                    endpoint: self.endpoint.clone(),
                    reason: err.to_string(),
                }
                .to_string()
            })?;

        let response = self.http.request(request).await.map_err(|err| {
            ProxyError::Transport {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
            .to_string()
        })?;

        let status = response.status();
        let body_bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|err| {
                ProxyError::Transport {
                    endpoint: self.endpoint.clone(),
                    reason: format!("failed reading response body: {err}"),
                }
                .to_string()
            })?;

        if status != StatusCode::OK {
            return Err(ProxyError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body_bytes).into_owned(),
            }
            .to_string());
        }

        let parsed: McpCallResponse = serde_json::from_slice(&body_bytes).map_err(|err| {
            ProxyError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
            .to_string()
        })?;

        let text = parsed
            .content
            .first()
            .map(|chunk| chunk.text.clone())
            .unwrap_or_default();

        if parsed.is_error {
            return Err(ProxyError::ToolError {
                function_name: self.function_name.clone(),
                message: text,
            }
            .to_string());
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_proxy_reports_its_identity() {
        let proxy = RemoteProxy::new(
            "http://weather:8080",
            "get_weather",
            "weather_service",
            "weather-12345678",
        );
        assert_eq!(proxy.capability(), "weather_service");
        assert_eq!(proxy.provider_agent_id(), "weather-12345678");
    }
}
