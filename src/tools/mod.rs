//! The two pull request tools: argument validation and handlers.

pub mod render;

use rmcp::model::{CallToolResult, Content};
use rmcp::schemars;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::github::{self, ChangedFile, Fetcher, PullRequestSummary, RequestIdentity};

pub const GET_PULL_REQUEST: &str = "get-pull-request";
pub const GET_PULL_REQUEST_FILES: &str = "get-pull-request-files";

/// Page size GitHub applies to the files endpoint when none is requested.
const DEFAULT_FILES_PAGE_SIZE: usize = 30;

/// Arguments shared by both tools.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PullRequestArgs {
    /// Repository owner/organization name
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Pull request number
    pub pr_number: u64,
}

impl PullRequestArgs {
    /// Checks the constraints the schema cannot express.
    pub fn into_identity(self) -> Result<RequestIdentity, String> {
        if self.owner.trim().is_empty() {
            return Err("owner must not be empty".to_string());
        }
        if self.repo.trim().is_empty() {
            return Err("repo must not be empty".to_string());
        }
        if self.pr_number == 0 {
            return Err("pr_number must be a positive integer".to_string());
        }

        Ok(RequestIdentity {
            owner: self.owner,
            repo: self.repo,
            pr_number: self.pr_number,
        })
    }
}

fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Validate the arguments, then run the named handler. Invalid arguments
/// come back as a tool error without touching GitHub.
pub async fn call_tool(name: &str, args: PullRequestArgs, fetcher: &dyn Fetcher) -> CallToolResult {
    let id = match args.into_identity() {
        Ok(id) => id,
        Err(reason) => {
            return CallToolResult::error(vec![Content::text(format!("Invalid arguments: {}", reason))])
        }
    };

    match name {
        GET_PULL_REQUEST => get_pull_request(&id, fetcher).await,
        GET_PULL_REQUEST_FILES => get_pull_request_files(&id, fetcher).await,
        _ => CallToolResult::error(vec![Content::text(format!("Unknown tool: {}", name))]),
    }
}

/// Fetch pull request metadata and render it as text. Upstream failures of
/// any kind become one generic message.
#[instrument(skip_all, fields(owner = %id.owner, repo = %id.repo, pr = id.pr_number))]
pub async fn get_pull_request(id: &RequestIdentity, fetcher: &dyn Fetcher) -> CallToolResult {
    let url = github::pull_request_url(fetcher.api_base(), id);

    match github::fetch_json::<PullRequestSummary>(fetcher, &url).await {
        Some(pr) => {
            debug!(title = %pr.title, state = %pr.state, "received PR metadata");
            text_result(render::pull_request(&pr))
        }
        None => text_result(render::PULL_REQUEST_FAILURE),
    }
}

/// Fetch the changed-file list and render one section per file, in the
/// order GitHub returned them. Only the first page is requested.
#[instrument(skip_all, fields(owner = %id.owner, repo = %id.repo, pr = id.pr_number))]
pub async fn get_pull_request_files(id: &RequestIdentity, fetcher: &dyn Fetcher) -> CallToolResult {
    let url = github::pull_request_files_url(fetcher.api_base(), id);

    let Some(files) = github::fetch_json::<Vec<ChangedFile>>(fetcher, &url).await else {
        return text_result(render::FILES_FAILURE);
    };

    debug!(files = files.len(), "received PR files");
    if files.is_empty() {
        return text_result(render::NO_FILES_CHANGED);
    }
    if files.len() == DEFAULT_FILES_PAGE_SIZE {
        warn!(files = files.len(), "file list fills a whole page and may be truncated");
    }

    text_result(render::changed_files(&files))
}
