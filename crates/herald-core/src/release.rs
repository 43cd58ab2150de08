//! Release data model shared by the changelog parser, the GitHub adapter,
//! and the message composer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Component label used when a change carries no scope.
pub const DEFAULT_COMPONENT: &str = "general";

/// One bullet-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Short label for the area of the codebase (e.g., `"api"`).
    pub component: String,
    /// Human-readable description.
    pub message: String,
    /// Link to the commit or pull request.
    pub change_url: String,
    /// Ticket reference found in the change text (e.g., `"PROJ-42"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<String>,
    /// Author handle, only known for GitHub-sourced changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl ChangeEntry {
    /// Whether `self` and `other` describe the same logical change.
    pub fn same_change(&self, other: &Self) -> bool {
        self.component == other.component && self.message == other.message
    }
}

/// Which list a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// New functionality.
    Feature,
    /// A bug fix.
    Bugfix,
}

/// One version's worth of changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version string (e.g., `"1.2.0"` or `"v1.2.0"`).
    pub version: String,
    /// Tag of this release, used as the end of the diff range.
    pub version_tag: String,
    /// Tag of the release before this one, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_tag: Option<String>,
    /// Link to the release or comparison page.
    pub release_url: String,
    /// Publication date.
    pub release_date: NaiveDate,
    /// Features, in the order they were found.
    pub features: Vec<ChangeEntry>,
    /// Bug fixes, in the order they were found.
    pub bugfixes: Vec<ChangeEntry>,
}

impl Release {
    /// Total number of changes across both lists.
    pub fn change_count(&self) -> usize {
        self.features.len() + self.bugfixes.len()
    }

    /// The list for the given kind.
    pub fn changes(&self, kind: ChangeKind) -> &[ChangeEntry] {
        match kind {
            ChangeKind::Feature => &self.features,
            ChangeKind::Bugfix => &self.bugfixes,
        }
    }
}

/// Split the last path segment of a comparison URL into
/// `(previous_tag, tag)`.
///
/// `https://github.com/o/r/compare/v1.1.0...v1.2.0` yields
/// `(Some("v1.1.0"), "v1.2.0")`. A URL without a `...` range yields the
/// final segment as the tag and no previous tag.
pub fn tags_from_url(url: &str) -> (Option<String>, String) {
    let segment = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    match segment.split_once("...") {
        Some((previous, current)) if !previous.is_empty() => {
            (Some(previous.to_string()), current.to_string())
        }
        Some((_, current)) => (None, current.to_string()),
        None => (None, segment.to_string()),
    }
}

/// Aggregate line-change counts for a tag range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Number of files changed.
    pub files_changed: u64,
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
}
