//! Session transport: opens and drives one MCP session.
//!
//! The production adapter uses rmcp with the streamable HTTP transport.
//! Both halves are traits so the connection manager can be exercised
//! against in-memory fakes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::{
    model::CallToolRequestParam,
    service::{RunningService, ServiceExt},
    transport::StreamableHttpClientTransport,
    RoleClient,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::normalize::{JsonObject, RawToolResult};
use super::tools::ToolInfo;

/// Type alias for the running MCP client service
type McpClientService = RunningService<RoleClient, ()>;

/// Opens sessions against an endpoint.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Connect and complete the protocol handshake.
    async fn open(&self, endpoint: &str) -> Result<Arc<dyn ToolSession>>;
}

/// One live session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Invoke a remote tool and return its raw result.
    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<RawToolResult>;

    /// List the tools the server advertises.
    async fn list_tools(&self) -> Result<Vec<ToolInfo>>;

    /// Shut the session down.
    async fn close(&self) -> Result<()>;
}

/// rmcp streamable HTTP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamableHttpTransport;

#[async_trait]
impl SessionTransport for StreamableHttpTransport {
    async fn open(&self, endpoint: &str) -> Result<Arc<dyn ToolSession>> {
        let transport = StreamableHttpClientTransport::from_uri(endpoint);

        // () implements ClientHandler with defaults
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect: {:?}", e))?;

        info!(peer = ?service.peer_info(), "connected to MCP server");
        Ok(Arc::new(RmcpSession { service }))
    }
}

struct RmcpSession {
    service: McpClientService,
}

#[async_trait]
impl ToolSession for RmcpSession {
    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<RawToolResult> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .context("tool call failed")?;

        let value = serde_json::to_value(&result).context("failed to encode tool result")?;
        Ok(RawToolResult::from_value(value))
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let tools_result = self
            .service
            .list_tools(Default::default())
            .await
            .context("failed to list tools")?;

        for tool in &tools_result.tools {
            debug!("  - {}: {:?}", tool.name, tool.description);
        }

        Ok(tools_result
            .tools
            .iter()
            .map(|tool| ToolInfo {
                name: tool.name.to_string(),
                description: tool.description.clone().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        // Cancellation token triggers graceful shutdown of the service task
        self.service.cancellation_token().cancel();
        Ok(())
    }
}
