//! Diff statistics: files/insertions/deletions between two tags.
//!
//! Thin orchestrator over [`git::shortstat()`](crate::git::shortstat).
//!
//! Non-fatal: returns `None` on any git error or unrecognized output (logs a
//! warning, the message is simply rendered without the stats line).

use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use tracing::{debug, warn};

use crate::git;
use crate::release::DiffStats;

static SHORTSTAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<files>\d+) files? changed(?:, (?P<insertions>\d+) insertions?\(\+\))?(?:, (?P<deletions>\d+) deletions?\(-\))?",
    )
    .expect("valid shortstat pattern")
});

/// Compute diff statistics for `from...to` in the repository at `repo`.
///
/// Returns `None` if the tags are missing, git is unavailable, or the
/// output has no shortstat summary.
pub fn compute_stats(repo: &Utf8Path, from: &str, to: &str) -> Option<DiffStats> {
    let output = match git::shortstat(repo, from, to) {
        Ok(output) => output,
        Err(e) => {
            warn!(%e, %from, %to, "failed to gather diff stats, skipping");
            return None;
        }
    };

    let stats = parse_shortstat(&output);
    if stats.is_none() {
        debug!(output = output.trim(), "no shortstat summary in git output");
    }
    stats
}

/// Parse the summary line printed by `git diff --shortstat`.
///
/// Git leaves out the insertions or deletions clause when its count is zero,
/// so only the files clause is required.
pub fn parse_shortstat(output: &str) -> Option<DiffStats> {
    let caps = SHORTSTAT.captures(output)?;
    let count = |name: &str| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    Some(DiffStats {
        files_changed: count("files"),
        insertions: count("insertions"),
        deletions: count("deletions"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_summary() {
        let stats =
            parse_shortstat(" 3 files changed, 10 insertions(+), 2 deletions(-)\n").unwrap();
        assert_eq!(
            stats,
            DiffStats {
                files_changed: 3,
                insertions: 10,
                deletions: 2
            }
        );
    }

    #[test]
    fn parses_singular_forms() {
        let stats = parse_shortstat(" 1 file changed, 1 insertion(+), 1 deletion(-)").unwrap();
        assert_eq!(stats.files_changed, 1);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.deletions, 1);
    }

    #[test]
    fn missing_clauses_default_to_zero() {
        let only_insertions = parse_shortstat(" 2 files changed, 7 insertions(+)").unwrap();
        assert_eq!(only_insertions.insertions, 7);
        assert_eq!(only_insertions.deletions, 0);

        let only_deletions = parse_shortstat(" 1 file changed, 4 deletions(-)").unwrap();
        assert_eq!(only_deletions.insertions, 0);
        assert_eq!(only_deletions.deletions, 4);
    }

    #[test]
    fn empty_output_is_none() {
        assert!(parse_shortstat("").is_none());
        assert!(parse_shortstat("fatal: bad revision").is_none());
    }

    #[test]
    fn bad_ref_returns_none() {
        let result = compute_stats(
            Utf8Path::new("."),
            "definitely-not-a-real-ref-abc123xyz",
            "another-missing-ref",
        );
        assert!(result.is_none());
    }
}
