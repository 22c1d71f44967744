/// MCP server startup using `rmcp` with stdio transport.
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use tracing::info;

use crate::mcp::tools::AppTools;
use crate::services::RagManager;

/// MCP server wrapping the shared `RagManager` and serving via stdio.
#[derive(Clone)]
pub struct McpServer {
    manager: Arc<RagManager>,
}

impl McpServer {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }

    /// Serve on stdio until the client disconnects.
    pub async fn start(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.manager.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        let service = router
            .serve((stdin, stdout))
            .await
            .context("failed to start MCP stdio transport")?;
        service
            .waiting()
            .await
            .context("MCP server encountered an error during stdio transport")?;

        info!("MCP client disconnected");
        Ok(())
    }
}
