mod config;
mod github;
mod mcp;
mod tools;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::github::Fetcher;

/// GitHub pull request review server for the Model Context Protocol.
///
/// Serves the `get-pull-request` and `get-pull-request-files` tools over
/// stdin/stdout. Requires a GitHub token (GITHUB_TOKEN, `.env`, or the
/// config file).
#[derive(Parser, Debug)]
#[command(name = "github-pullrequest-review", version, about)]
struct Cli {
    /// Path to a TOML config file (default: ./.github-pullrequest-review.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GitHub API base URL, e.g. for GitHub Enterprise
    #[arg(long)]
    api_base: Option<String>,

    /// Default log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries the protocol; logs must stay on stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting github-pullrequest-review");

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(api_base) = cli.api_base {
        config.github.api_base = Some(api_base);
    }

    let settings = config
        .github_settings()
        .inspect_err(|err| error!(error = %err, "refusing to start"))?;

    let client = github::GitHubClient::new(settings);
    debug!(api_base = %client.api_base(), "GitHub client ready");

    let server = mcp::PullRequestReviewServer::new(Arc::new(client));
    info!("GitHub PR Review MCP Server running on stdio");
    mcp::serve_stdio(server).await?;

    Ok(())
}
