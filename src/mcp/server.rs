//! MCP server handler exposing the two pull request tools.

use std::sync::Arc;

use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use tracing::debug;

use crate::github::Fetcher;
use crate::tools::{self, PullRequestArgs};

pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Clone)]
pub struct PullRequestReviewServer {
    fetcher: Arc<dyn Fetcher>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PullRequestReviewServer {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            tool_router: Self::tool_router(),
        }
    }

    async fn dispatch_tool(&self, name: &str, args: PullRequestArgs) -> Result<CallToolResult, McpError> {
        debug!(tool = name, "tool call");
        Ok(tools::call_tool(name, args, self.fetcher.as_ref()).await)
    }

    #[tool(
        name = "get-pull-request",
        description = "Get information about a GitHub pull request"
    )]
    async fn get_pull_request(
        &self,
        Parameters(args): Parameters<PullRequestArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch_tool(tools::GET_PULL_REQUEST, args).await
    }

    #[tool(
        name = "get-pull-request-files",
        description = "Get files changed in a GitHub pull request"
    )]
    async fn get_pull_request_files(
        &self,
        Parameters(args): Parameters<PullRequestArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch_tool(tools::GET_PULL_REQUEST_FILES, args).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PullRequestReviewServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo {
            instructions: Some(
                "Read-only GitHub pull request tools: get-pull-request and get-pull-request-files."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        };
        info.server_info.name = SERVER_NAME.to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info
    }
}
