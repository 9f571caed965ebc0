use serde::Deserialize;

/// Pull request metadata as returned by `GET /repos/{owner}/{repo}/pulls/{n}`.
/// Only the fields the server renders are kept; the rest of the payload is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    /// PR title
    pub title: String,
    /// PR number (e.g., 42)
    pub number: u64,
    /// Browser URL of the PR
    pub html_url: String,
    pub user: User,
    /// Description; GitHub sends `null` when none was written
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Lifecycle state as reported upstream ("open", "closed")
    pub state: String,
    /// Total lines added
    pub additions: u64,
    /// Total lines deleted
    pub deletions: u64,
    /// Total files changed
    pub changed_files: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

/// A single entry of `GET /repos/{owner}/{repo}/pulls/{n}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    /// File path (e.g., "src/auth/config.rs")
    pub filename: String,
    /// Lines added in this file
    pub additions: u64,
    /// Lines deleted in this file
    pub deletions: u64,
    /// additions + deletions, as computed by GitHub
    pub changes: u64,
    /// "added", "modified", "removed", "renamed", ...
    pub status: String,
    /// Unified diff hunk text. Absent for binary files and very large diffs.
    #[serde(default)]
    pub patch: Option<String>,
}

/// Identifies one pull request: the arguments both tools take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}
