//! Minimal mesh agent example demonstrating the orchestrator runtime.

use agentmesh_config::AgentConfig;
use agentmesh_runtime::Orchestrator;
use agentmesh_tools::macros::tool;
use agentmesh_tools::registry::ToolResult;
use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Example command-line arguments.
#[derive(Parser, Debug)]
struct Args {
    /// Optional agent name override.
    #[arg(long)]
    name: Option<String>,

    /// Heartbeat interval in seconds.
    #[arg(long, default_value_t = 10)]
    heartbeat: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AgentConfig::from_env();
    if let Some(name) = args.name {
        config.agent_name = Some(name);
    }
    config.heartbeat_interval = std::time::Duration::from_secs(args.heartbeat);

    agentmesh_telemetry::init_tracing(&config.log_level);

    Orchestrator::start_service(config).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct EchoRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct EchoResponse {
    message: String,
}

#[tool(
    capability = "tool.echo",
    version = "1.0.0",
    description = "Echo tool for demonstration",
    tags = ["utility", "demo"],
)]
async fn echo_tool(input: EchoRequest) -> ToolResult<EchoResponse> {
    Ok(EchoResponse {
        message: input.message,
    })
}
