//! Wire formats exchanged with the mesh registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dependency entry as carried on the wire, already-normalized form
/// (mirrors [`agentmesh_core::DependencyDescriptor`]'s shorthand handling,
/// but kept independent here since the registry speaks its own wire schema).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyWire {
    /// Capability this dependency resolves to.
    pub capability: String,
    /// Tags narrowing which provider may satisfy it.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional version constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One decorated tool function, as advertised in a heartbeat.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecoratorWire {
    /// The function name the tool was registered under.
    pub function_name: String,
    /// The capability this tool provides.
    pub capability: String,
    /// The tool's version string.
    pub version: String,
    /// Tags attached to the tool.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Dependencies this tool function requires.
    #[serde(default)]
    pub dependencies: Vec<DependencyWire>,
}

/// Agent-level metadata carried in every heartbeat.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatMetadata {
    /// Human-readable agent name.
    pub name: String,
    /// Agent type identifier (always `"mcp_agent"` for this runtime).
    pub agent_type: String,
    /// Logical namespace grouping agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// HTTP endpoint this agent can be reached at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Self-reported status string (e.g. `"healthy"`, `"degraded"`).
    pub status: String,
    /// Capability strings this agent's tools collectively provide.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Seconds since this process started.
    pub uptime_seconds: u64,
    /// Agent version string.
    pub version: String,
    /// Tool decorators registered by this agent.
    #[serde(default)]
    pub decorators: Vec<DecoratorWire>,
}

/// A heartbeat (or initial registration) request body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatRequest {
    /// This process's mesh identity.
    pub agent_id: String,
    /// ISO-8601 UTC timestamp the request was built at.
    pub timestamp: DateTime<Utc>,
    /// Agent-level metadata.
    pub metadata: HeartbeatMetadata,
}

/// Resolution status for one dependency of one function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// The capability that was being resolved.
    pub capability: String,
    /// Resolution status: `"resolved"` or `"unavailable"`.
    pub status: String,
    /// Provider details, present only when `status == "resolved"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_tool_info: Option<McpToolInfo>,
}

/// Identifies the concrete tool a resolved dependency points at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpToolInfo {
    /// The agent that owns the providing tool.
    pub agent_id: String,
    /// HTTP endpoint to reach it at.
    pub endpoint: String,
    /// Function name to invoke on that endpoint.
    pub name: String,
}

/// Dependency resolution results for one function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDependencies {
    /// Name of the function these dependencies belong to.
    pub function_name: String,
    /// Resolution of each declared dependency.
    pub dependencies: Vec<ResolvedDependency>,
}

/// The registry's response to a heartbeat.
///
/// The registry may report `dependencies_resolved` in either the current
/// per-function shape (a list of [`FunctionDependencies`]) or a legacy flat
/// map (`{capability: mcp_tool_info}` with no function grouping). Both are
/// accepted and normalized to the per-function shape, with the legacy map
/// folded under a single synthetic function named `"legacy_tool"` — matching
/// how a single-function agent's dependencies looked before per-function
/// grouping was introduced.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct HeartbeatResponse {
    /// Echoes the agent identity the heartbeat was sent for.
    pub agent_id: String,
    /// Registry's view of this agent's status.
    pub status: String,
    /// ISO-8601 UTC timestamp the registry processed the heartbeat at.
    pub timestamp: DateTime<Utc>,
    /// Normalized, per-function dependency resolution.
    pub dependencies_resolved: Vec<FunctionDependencies>,
}

impl<'de> Deserialize<'de> for HeartbeatResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            agent_id: String,
            status: String,
            timestamp: DateTime<Utc>,
            #[serde(default)]
            dependencies_resolved: Option<serde_json::Value>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let dependencies_resolved = match raw.dependencies_resolved {
            None => Vec::new(),
            Some(value) => parse_dependencies_resolved(value).map_err(serde::de::Error::custom)?,
        };

        Ok(Self {
            agent_id: raw.agent_id,
            status: raw.status,
            timestamp: raw.timestamp,
            dependencies_resolved,
        })
    }
}

/// One entry of the legacy flat-map `dependencies_resolved` shape:
/// `{capability: {agent_id, endpoint, function_name, status}}`. Note the
/// field is `function_name` here, unlike [`McpToolInfo`]'s `name` — the two
/// shapes were never fully unified on the wire.
#[derive(Clone, Debug, Deserialize)]
struct LegacyDependencyInfo {
    agent_id: String,
    endpoint: String,
    function_name: String,
    status: String,
}

/// Normalizes the two accepted `dependencies_resolved` wire shapes.
///
/// # Errors
///
/// Returns an error message if `value` is neither a JSON array of
/// [`FunctionDependencies`] nor a JSON object matching the legacy flat map.
pub fn parse_dependencies_resolved(
    value: serde_json::Value,
) -> Result<Vec<FunctionDependencies>, String> {
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)
            .map_err(|err| format!("invalid dependencies_resolved list: {err}")),
        serde_json::Value::Object(map) => {
            let mut dependencies = Vec::with_capacity(map.len());
            for (capability, info) in map {
                if info.is_null() {
                    dependencies.push(ResolvedDependency {
                        capability,
                        status: "unavailable".to_owned(),
                        mcp_tool_info: None,
                    });
                    continue;
                }

                let legacy = serde_json::from_value::<LegacyDependencyInfo>(info)
                    .map_err(|err| format!("invalid legacy dependency entry: {err}"))?;
                let mcp_tool_info = if legacy.status == "resolved" {
                    Some(McpToolInfo {
                        agent_id: legacy.agent_id,
                        endpoint: legacy.endpoint,
                        name: legacy.function_name,
                    })
                } else {
                    None
                };
                dependencies.push(ResolvedDependency {
                    capability,
                    status: legacy.status,
                    mcp_tool_info,
                });
            }
            Ok(vec![FunctionDependencies {
                function_name: "legacy_tool".to_owned(),
                dependencies,
            }])
        }
        other => Err(format!(
            "dependencies_resolved must be an array or object, got {other}"
        )),
    }
}

/// A single entry returned by `list_agents`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    /// The agent's mesh identity.
    pub agent_id: String,
    /// Metadata last advertised by that agent.
    pub metadata: HeartbeatMetadata,
    /// When the registry last heard from this agent.
    pub last_seen: DateTime<Utc>,
}

/// Response body for `GET /agents`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentList {
    /// The known agents.
    pub agents: Vec<AgentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_per_function_shape() {
        let value = json!([
            {
                "function_name": "get_weather",
                "dependencies": [
                    {
                        "capability": "date_service",
                        "status": "resolved",
                        "mcp_tool_info": {
                            "agent_id": "date-abc123",
                            "endpoint": "http://date:8080",
                            "name": "get_date"
                        }
                    }
                ]
            }
        ]);

        let parsed = parse_dependencies_resolved(value).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].function_name, "get_weather");
        assert_eq!(parsed[0].dependencies[0].status, "resolved");
    }

    #[test]
    fn normalizes_legacy_flat_map() {
        let value = json!({
            "date_service": {
                "agent_id": "date-abc123",
                "endpoint": "http://date:8080",
                "function_name": "get_date",
                "status": "resolved"
            },
            "unavailable_service": null,
        });

        let parsed = parse_dependencies_resolved(value).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].function_name, "legacy_tool");
        assert_eq!(parsed[0].dependencies.len(), 2);

        let available = parsed[0]
            .dependencies
            .iter()
            .find(|d| d.capability == "date_service")
            .unwrap();
        assert_eq!(available.status, "resolved");
        assert_eq!(
            available.mcp_tool_info.as_ref().unwrap().name,
            "get_date"
        );

        let unavailable = parsed[0]
            .dependencies
            .iter()
            .find(|d| d.capability == "unavailable_service")
            .unwrap();
        assert_eq!(unavailable.status, "unavailable");
        assert!(unavailable.mcp_tool_info.is_none());
    }

    #[test]
    fn full_response_round_trips_through_legacy_shape() {
        let body = json!({
            "agent_id": "weather-12345678",
            "status": "healthy",
            "timestamp": "2026-01-01T00:00:00Z",
            "dependencies_resolved": {
                "date_service": {
                    "agent_id": "date-abc123",
                    "endpoint": "http://date:8080",
                    "function_name": "get_date",
                    "status": "resolved"
                }
            }
        });

        let response: HeartbeatResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.agent_id, "weather-12345678");
        assert_eq!(response.dependencies_resolved[0].function_name, "legacy_tool");
    }
}
