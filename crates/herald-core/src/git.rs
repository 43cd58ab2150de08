//! Git operations used to collect release input.
//!
//! Shells out to `git` for all operations so the user's configuration
//! (safe directories, credentials, shallow-clone settings) applies as-is.

use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "diff").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Lines added to `path` between `base` and `HEAD`.
///
/// Runs `git diff <base> HEAD -- <path>` and keeps the `+` lines of the
/// patch (without the `+++` file header), marker stripped. The result is
/// the newly written part of the changelog, ready for parsing.
#[instrument(skip(repo))]
pub fn added_lines(repo: &Utf8Path, path: &Utf8Path, base: &str) -> GitResult<String> {
    let output = git_in(repo, &["diff", base, "HEAD", "--", path.as_str()])?;
    let added = added_lines_from_patch(&output);
    debug!(lines = added.lines().count(), "changelog lines added");
    Ok(added)
}

fn added_lines_from_patch(patch: &str) -> String {
    patch
        .lines()
        .filter(|line| !line.starts_with("+++"))
        .filter_map(|line| line.strip_prefix('+'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw `git diff --shortstat <from>...<to>` output.
#[instrument]
pub fn shortstat(repo: &Utf8Path, from: &str, to: &str) -> GitResult<String> {
    let range = format!("{from}...{to}");
    let output = git_in(repo, &["diff", "--shortstat", &range])?;
    debug!(output = output.trim(), "shortstat");
    Ok(output)
}

/// Get the remote URL for a named remote (default: `"origin"`).
#[instrument]
pub fn remote_url(repo: &Utf8Path, remote: &str) -> GitResult<Option<String>> {
    let result = git_in(repo, &["remote", "get-url", remote]);
    match result {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Check if `repo` is inside a git work tree.
#[instrument]
pub fn is_inside_repo(repo: &Utf8Path) -> GitResult<bool> {
    let result = git_in(repo, &["rev-parse", "--is-inside-work-tree"]);
    match result {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run a git command in `repo` and return its stdout.
fn git_in(repo: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo.as_str())
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
