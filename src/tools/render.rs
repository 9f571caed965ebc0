use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

use crate::github::{ChangedFile, PullRequestSummary};

pub const PULL_REQUEST_FAILURE: &str = "Failed to retrieve pull request data";
pub const FILES_FAILURE: &str = "Failed to retrieve pull request files data";
pub const NO_FILES_CHANGED: &str = "No files changed in this pull request";
pub const NO_DESCRIPTION: &str = "No description provided";

/// Render pull request metadata as a markdown block.
///
/// # Pull Request: Fix typo (#42)
///
/// **Author:** octocat
/// **URL:** https://github.com/octocat/hello-world/pull/42
/// ...
pub fn pull_request(pr: &PullRequestSummary) -> String {
    pull_request_in(pr, &Local)
}

fn pull_request_in<Tz>(pr: &PullRequestSummary, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let body = match pr.body.as_deref() {
        Some(body) if !body.is_empty() => body,
        _ => NO_DESCRIPTION,
    };

    format!(
        "
# Pull Request: {title} (#{number})

**Author:** {author}
**URL:** {url}
**State:** {state}
**Created:** {created}
**Updated:** {updated}

**Changes:**
- {files} files changed
- {additions} additions
- {deletions} deletions

**Description:**
{body}
",
        title = pr.title,
        number = pr.number,
        author = pr.user.login,
        url = pr.html_url,
        state = pr.state,
        created = timestamp_in(&pr.created_at, tz),
        updated = timestamp_in(&pr.updated_at, tz),
        files = pr.changed_files,
        additions = pr.additions,
        deletions = pr.deletions,
    )
}

/// Render the changed-file list, one section per file in the order given.
/// Callers handle the empty list separately.
pub fn changed_files(files: &[ChangedFile]) -> String {
    let sections: Vec<String> = files.iter().map(file_section).collect();
    format!("# Files Changed in Pull Request\n\n{}", sections.join("\n"))
}

fn file_section(file: &ChangedFile) -> String {
    let patch = match file.patch.as_deref() {
        Some(patch) if !patch.is_empty() => format!("\n```diff\n{}\n```", patch),
        _ => String::new(),
    };

    format!(
        "\n## {}\n- Status: {}\n- Changes: {} ({} additions, {} deletions)\n{}\n",
        file.filename, file.status, file.changes, file.additions, file.deletions, patch
    )
}

/// RFC 3339 timestamp shown in the given zone as `1/2/2024, 3:04:05 PM`.
fn timestamp_in<Tz>(raw: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(tz)
            .format("%-m/%-d/%Y, %-I:%M:%S %p")
            .to_string(),
        Err(_) => "Invalid Date".to_string(),
    }
}
