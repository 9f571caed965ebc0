//! MCP server handler and the guarded stdio transport.

pub mod server;
pub mod transport;

pub use server::PullRequestReviewServer;
pub use transport::serve_stdio;
