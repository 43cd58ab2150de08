//! GitHub releases as an alternative release source.
//!
//! Two concerns live here:
//!
//! 1. **Range resolution** ([`resolve_range`]): page through the releases
//!    listing until both the previous and the new tag are found, then slice
//!    out the releases between them and detect rollbacks.
//! 2. **Adaptation** ([`adapt_platform_releases`]): turn the free-text bodies
//!    of those releases into [`Release`] records with features and bug fixes.
//!
//! The listing itself sits behind [`ReleaseListing`] so the resolver does not
//! care whether releases come from the REST API ([`GithubClient`]) or a test
//! fixture.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::release::{ChangeEntry, DEFAULT_COMPONENT, Release};
use crate::ticket;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per page; a shorter page means the listing is exhausted.
pub const PAGE_SIZE: u32 = 100;

/// Author recorded when a release bullet does not name one.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Errors from the GitHub release source.
#[derive(Error, Debug)]
pub enum GithubError {
    /// HTTP transport or decoding failure.
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered 404 for the releases listing.
    #[error("repository {0} not found or no releases available")]
    RepositoryNotFound(String),

    /// The API answered with another non-success status.
    #[error("GitHub API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// A requested tag is not in the listing.
    #[error("release with tag {0} not found")]
    TagNotFound(String),

    /// Both tags were found but nothing lies between them.
    #[error("no releases found between {previous} and {new}")]
    EmptyRange {
        /// The previously deployed tag.
        previous: String,
        /// The newly deployed tag.
        new: String,
    },
}

/// Result alias for GitHub operations.
pub type GithubResult<T> = Result<T, GithubError>;

/// A release object as returned by `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformRelease {
    /// Tag name (e.g., `"v1.2.3"`).
    pub tag_name: String,
    /// Web URL of the release page.
    pub html_url: String,
    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Publication timestamp (absent for drafts).
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ──────────────────────────────────────────────
// Listing
// ──────────────────────────────────────────────

/// A paginated source of releases, newest first.
pub trait ReleaseListing {
    /// Fetch one page (1-based) of at most `per_page` releases.
    fn page(&self, page: u32, per_page: u32) -> GithubResult<Vec<PlatformRelease>>;
}

/// Blocking client for the GitHub releases API.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GithubClient {
    /// Create a client for `repository` (`owner/name`).
    ///
    /// `token` is sent as a bearer token without interpretation.
    pub fn new(api_url: &str, repository: &str, token: &str) -> GithubResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            token: token.to_string(),
        })
    }
}

impl ReleaseListing for GithubClient {
    #[instrument(skip(self), fields(repository = %self.repository))]
    fn page(&self, page: u32, per_page: u32) -> GithubResult<Vec<PlatformRelease>> {
        let url = format!("{}/repos/{}/releases", self.api_url, self.repository);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .query(&[("page", page), ("per_page", per_page)])
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GithubError::RepositoryNotFound(self.repository.clone()));
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(GithubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let releases: Vec<PlatformRelease> = response.json()?;
        debug!(count = releases.len(), "fetched releases page");
        Ok(releases)
    }
}

// ──────────────────────────────────────────────
// Range resolution
// ──────────────────────────────────────────────

/// The releases between two deployed tags.
#[derive(Debug, Clone)]
pub struct ReleaseRange {
    /// Releases in listing order (newest first).
    pub releases: Vec<PlatformRelease>,
    /// Whether the new tag is older than the previous one.
    pub is_rollback: bool,
}

/// Prefix `tag` with `v` unless it already has one.
pub fn normalize_tag(tag: &str) -> String {
    if tag.starts_with('v') {
        tag.to_string()
    } else {
        format!("v{tag}")
    }
}

/// Find `previous` and `new` in the listing and return what lies between.
///
/// The listing is newest first and its order is taken as-is. A forward
/// deploy returns `[new, previous)`; when `new` sits further down the
/// listing than `previous` the deploy is a rollback and the releases being
/// rolled back, `(previous, new]`, are returned.
#[instrument(skip(listing))]
pub fn resolve_range(
    listing: &impl ReleaseListing,
    previous: &str,
    new: &str,
) -> GithubResult<ReleaseRange> {
    let previous_tag = normalize_tag(previous);
    let new_tag = normalize_tag(new);

    let mut all: Vec<PlatformRelease> = Vec::new();
    let mut new_index = None;
    let mut previous_index = None;
    let mut page = 1;

    while new_index.is_none() || previous_index.is_none() {
        let batch = listing.page(page, PAGE_SIZE)?;
        if batch.is_empty() {
            break;
        }

        let offset = all.len();
        let exhausted = batch.len() < PAGE_SIZE as usize;
        let position = |tag: &str| {
            batch
                .iter()
                .position(|r| r.tag_name == tag)
                .map(|i| offset + i)
        };
        new_index = new_index.or_else(|| position(&new_tag));
        previous_index = previous_index.or_else(|| position(&previous_tag));
        all.extend(batch);

        if exhausted {
            break;
        }
        page += 1;
    }

    let new_index = new_index.ok_or_else(|| GithubError::TagNotFound(new_tag.clone()))?;
    let previous_index =
        previous_index.ok_or_else(|| GithubError::TagNotFound(previous_tag.clone()))?;

    let is_rollback = new_index > previous_index;
    let releases: Vec<PlatformRelease> = if is_rollback {
        all.drain(previous_index + 1..=new_index).collect()
    } else {
        all.drain(new_index..previous_index).collect()
    };

    if releases.is_empty() {
        return Err(GithubError::EmptyRange {
            previous: previous_tag,
            new: new_tag,
        });
    }

    if is_rollback {
        info!(count = releases.len(), from = %previous_tag, to = %new_tag, "detected rollback");
    } else {
        info!(count = releases.len(), from = %previous_tag, to = %new_tag, "found releases");
    }

    Ok(ReleaseRange {
        releases,
        is_rollback,
    })
}

// ──────────────────────────────────────────────
// Adaptation
// ──────────────────────────────────────────────

static COMMIT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:feat|fix)(?:\((?P<scope>[\w-]+)\))?!?:\s+")
        .expect("valid commit prefix pattern")
});

static ATTRIBUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s+)by @(?P<author>[\w\[\]-]+) in (?P<url>https?://\S+)\s*$")
        .expect("valid attribution pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Features,
    BugFixes,
}

/// Convert GitHub releases into [`Release`] records.
///
/// Releases without any timestamp are skipped.
pub fn adapt_platform_releases(raw: &[PlatformRelease]) -> Vec<Release> {
    raw.iter().filter_map(adapt_release).collect()
}

fn adapt_release(raw: &PlatformRelease) -> Option<Release> {
    let Some(timestamp) = raw.published_at.or(raw.created_at) else {
        warn!(tag = %raw.tag_name, "release has no publish date, skipping");
        return None;
    };

    let mut features = Vec::new();
    let mut bugfixes = Vec::new();
    let mut section = None;

    for line in raw.body.as_deref().unwrap_or_default().lines() {
        let trimmed = line.trim();
        let Some(item) = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('*'))
            .map(str::trim)
        else {
            continue;
        };
        if item.is_empty() || item.to_lowercase().contains("full changelog") {
            continue;
        }

        let lowered = item.to_lowercase();
        if lowered.starts_with("feat") {
            section = Some(Section::Features);
        } else if lowered.starts_with("fix") {
            section = Some(Section::BugFixes);
        }

        let entry = parse_item(item, &raw.html_url);
        match section.unwrap_or_else(|| guess_section(&lowered)) {
            Section::Features => features.push(entry),
            Section::BugFixes => bugfixes.push(entry),
        }
    }

    debug!(
        tag = %raw.tag_name,
        features = features.len(),
        bugfixes = bugfixes.len(),
        "adapted release"
    );

    Some(Release {
        version: raw.tag_name.clone(),
        version_tag: raw.tag_name.clone(),
        previous_version_tag: None,
        release_url: raw.html_url.clone(),
        release_date: timestamp.date_naive(),
        features,
        bugfixes,
    })
}

/// Best-effort fallback when no `feat`/`fix` keyword has been seen yet.
fn guess_section(lowered: &str) -> Section {
    if lowered.contains("fix") || lowered.contains("bug") {
        Section::BugFixes
    } else {
        Section::Features
    }
}

/// Extract component, message, author, and link from one bullet.
///
/// Each part falls back on its own: no scope gives the default component, no
/// `by @author in <url>` trailer gives the unknown author and the release
/// URL, and a message that ends up empty falls back to the whole bullet.
fn parse_item(item: &str, release_url: &str) -> ChangeEntry {
    let (component, rest) = match COMMIT_PREFIX.captures(item) {
        Some(caps) => {
            let component = caps
                .name("scope")
                .map_or(DEFAULT_COMPONENT, |m| m.as_str())
                .to_string();
            let rest_start = caps.get(0).map_or(0, |m| m.end());
            (component, &item[rest_start..])
        }
        None => (DEFAULT_COMPONENT.to_string(), item),
    };

    let (message, author, change_url) = match ATTRIBUTION.captures(rest) {
        Some(caps) => {
            let start = caps.get(0).map_or(rest.len(), |m| m.start());
            (
                rest[..start].trim(),
                caps["author"].to_string(),
                caps["url"].to_string(),
            )
        }
        None => (
            rest.trim(),
            UNKNOWN_AUTHOR.to_string(),
            release_url.to_string(),
        ),
    };

    let message = if message.is_empty() { item } else { message };

    ChangeEntry {
        component,
        message: message.to_string(),
        change_url,
        ticket_ref: ticket::extract_ticket(item),
        author: Some(author),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn release(tag: &str) -> PlatformRelease {
        PlatformRelease {
            tag_name: tag.to_string(),
            html_url: format!("https://github.com/acme/billing/releases/tag/{tag}"),
            body: None,
            published_at: "2024-03-05T10:30:00Z".parse().ok(),
            created_at: None,
        }
    }

    fn with_body(tag: &str, body: &str) -> PlatformRelease {
        PlatformRelease {
            body: Some(body.to_string()),
            ..release(tag)
        }
    }

    struct FixtureListing {
        releases: Vec<PlatformRelease>,
        calls: Cell<u32>,
    }

    impl FixtureListing {
        fn new(tags: &[&str]) -> Self {
            Self {
                releases: tags.iter().map(|t| release(t)).collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl ReleaseListing for FixtureListing {
        fn page(&self, page: u32, _per_page: u32) -> GithubResult<Vec<PlatformRelease>> {
            self.calls.set(self.calls.get() + 1);
            let per_page = PAGE_SIZE as usize;
            let start = (page as usize - 1) * per_page;
            Ok(self
                .releases
                .iter()
                .skip(start)
                .take(per_page)
                .cloned()
                .collect())
        }
    }

    fn tags(range: &ReleaseRange) -> Vec<&str> {
        range.releases.iter().map(|r| r.tag_name.as_str()).collect()
    }

    #[test]
    fn forward_deploy_returns_new_up_to_previous() {
        let listing = FixtureListing::new(&["v1.3.0", "v1.2.0", "v1.1.0", "v1.0.0"]);
        let range = resolve_range(&listing, "v1.0.0", "v1.2.0").unwrap();
        assert!(!range.is_rollback);
        assert_eq!(tags(&range), ["v1.2.0", "v1.1.0"]);
    }

    #[test]
    fn rollback_returns_releases_being_rolled_back() {
        let listing = FixtureListing::new(&["v1.3.0", "v1.2.0", "v1.1.0", "v1.0.0"]);
        let range = resolve_range(&listing, "v1.3.0", "v1.1.0").unwrap();
        assert!(range.is_rollback);
        // (previous_index, new_index] = (0, 2]
        assert_eq!(tags(&range), ["v1.2.0", "v1.1.0"]);
    }

    #[test]
    fn tags_without_v_prefix_are_normalized() {
        let listing = FixtureListing::new(&["v2.0.0", "v1.9.0"]);
        let range = resolve_range(&listing, "1.9.0", "2.0.0").unwrap();
        assert_eq!(tags(&range), ["v2.0.0"]);
    }

    #[test]
    fn missing_tag_is_an_error() {
        let listing = FixtureListing::new(&["v1.1.0", "v1.0.0"]);
        let err = resolve_range(&listing, "v1.0.0", "v9.9.9").unwrap_err();
        assert!(matches!(err, GithubError::TagNotFound(ref t) if t == "v9.9.9"));

        let err = resolve_range(&listing, "v0.1.0", "v1.1.0").unwrap_err();
        assert!(matches!(err, GithubError::TagNotFound(ref t) if t == "v0.1.0"));
    }

    #[test]
    fn same_tag_is_an_empty_range() {
        let listing = FixtureListing::new(&["v1.1.0", "v1.0.0"]);
        let err = resolve_range(&listing, "v1.1.0", "v1.1.0").unwrap_err();
        assert!(matches!(err, GithubError::EmptyRange { .. }));
    }

    #[test]
    fn pagination_stops_once_both_tags_are_found() {
        let mut listing = FixtureListing::new(&[]);
        listing.releases = (0..250).map(|i| release(&format!("v{}", 250 - i))).collect();

        // v160 is on page 1, v140 on page 2; page 3 is never requested.
        let range = resolve_range(&listing, "v140", "v160").unwrap();
        assert_eq!(range.releases.len(), 20);
        assert_eq!(listing.calls.get(), 2);
    }

    #[test]
    fn short_page_ends_the_listing() {
        let listing = FixtureListing::new(&["v1.1.0", "v1.0.0"]);
        let _ = resolve_range(&listing, "v0.1.0", "v1.1.0");
        assert_eq!(listing.calls.get(), 1);
    }

    #[test]
    fn adapts_conventional_bullets() {
        let raw = with_body(
            "v1.2.0",
            "## What's Changed\n\
             * feat(api): add invoice export PROJ-7 by @alice in https://github.com/acme/billing/pull/12\n\
             * fix(ui): broken layout by @bob in https://github.com/acme/billing/pull/13\n\
             \n\
             **Full Changelog**: https://github.com/acme/billing/compare/v1.1.0...v1.2.0\n",
        );
        let releases = adapt_platform_releases(&[raw]);
        assert_eq!(releases.len(), 1);
        let release = &releases[0];
        assert_eq!(release.version, "v1.2.0");
        assert_eq!(release.release_date.to_string(), "2024-03-05");

        let feature = &release.features[0];
        assert_eq!(feature.component, "api");
        assert_eq!(feature.message, "add invoice export PROJ-7");
        assert_eq!(feature.author.as_deref(), Some("alice"));
        assert_eq!(
            feature.change_url,
            "https://github.com/acme/billing/pull/12"
        );
        assert_eq!(feature.ticket_ref.as_deref(), Some("PROJ-7"));

        let fix = &release.bugfixes[0];
        assert_eq!(fix.component, "ui");
        assert_eq!(fix.message, "broken layout");
    }

    #[test]
    fn full_changelog_bullet_is_skipped() {
        let raw = with_body(
            "v1.0.0",
            "- **Full Changelog**: https://github.com/acme/billing/compare/v0.9.0...v1.0.0",
        );
        let releases = adapt_platform_releases(&[raw]);
        assert_eq!(releases[0].change_count(), 0);
    }

    #[test]
    fn unstructured_bullet_falls_back_per_field() {
        let raw = with_body("v1.0.0", "- Improve startup time");
        let releases = adapt_platform_releases(&[raw]);
        let entry = &releases[0].features[0];
        assert_eq!(entry.component, DEFAULT_COMPONENT);
        assert_eq!(entry.message, "Improve startup time");
        assert_eq!(entry.author.as_deref(), Some(UNKNOWN_AUTHOR));
        assert_eq!(
            entry.change_url,
            "https://github.com/acme/billing/releases/tag/v1.0.0"
        );
    }

    #[test]
    fn only_feat_and_fix_prefixes_are_stripped() {
        let raw = with_body(
            "v1.0.0",
            "- Note: requires DB migration\n- Breaking: drop v1 endpoints\n- Feat(api): export",
        );
        let releases = adapt_platform_releases(&[raw]);
        let messages: Vec<_> = releases[0]
            .features
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(
            messages,
            ["Note: requires DB migration", "Breaking: drop v1 endpoints", "export"]
        );
        assert_eq!(releases[0].features[0].component, DEFAULT_COMPONENT);
        assert_eq!(releases[0].features[2].component, "api");
    }

    #[test]
    fn keyword_classification_is_sticky() {
        let raw = with_body(
            "v1.0.0",
            "- fix: first\n- also this one\n- feat: second\n- and this",
        );
        let releases = adapt_platform_releases(&[raw]);
        let release = &releases[0];
        let fixes: Vec<_> = release.bugfixes.iter().map(|e| e.message.as_str()).collect();
        let feats: Vec<_> = release.features.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(fixes, ["first", "also this one"]);
        assert_eq!(feats, ["second", "and this"]);
    }

    #[test]
    fn heuristic_applies_before_any_keyword() {
        let raw = with_body(
            "v1.0.0",
            "- Resolve bug in parser\n- Quickfix Mode for editors\n- New dashboard",
        );
        let releases = adapt_platform_releases(&[raw]);
        let release = &releases[0];
        // "Quickfix Mode" is a feature, but the heuristic cannot tell.
        assert_eq!(release.bugfixes.len(), 2);
        assert_eq!(release.features.len(), 1);
    }

    #[test]
    fn non_bullet_lines_are_ignored() {
        let raw = with_body("v1.0.0", "## Highlights\nSome prose.\n\n* feat: real item");
        let releases = adapt_platform_releases(&[raw]);
        assert_eq!(releases[0].change_count(), 1);
    }

    #[test]
    fn no_deduplication_for_platform_releases() {
        let raw = with_body("v1.0.0", "- feat: same\n- feat: same");
        let releases = adapt_platform_releases(&[raw]);
        assert_eq!(releases[0].features.len(), 2);
    }

    #[test]
    fn release_without_dates_is_skipped() {
        let raw = PlatformRelease {
            published_at: None,
            created_at: None,
            ..release("v1.0.0")
        };
        assert!(adapt_platform_releases(&[raw]).is_empty());
    }

    #[test]
    fn created_at_is_used_for_drafts() {
        let raw = PlatformRelease {
            published_at: None,
            created_at: "2024-01-02T00:00:00Z".parse().ok(),
            ..release("v1.0.0")
        };
        let releases = adapt_platform_releases(&[raw]);
        assert_eq!(releases[0].release_date.to_string(), "2024-01-02");
    }

    #[test]
    fn deserializes_api_payload() {
        let json = r#"[{
            "tag_name": "v1.2.3",
            "html_url": "https://github.com/acme/billing/releases/tag/v1.2.3",
            "body": "* feat: thing",
            "published_at": "2024-01-15T10:30:00Z",
            "created_at": "2024-01-15T10:00:00Z",
            "draft": false
        }]"#;
        let releases: Vec<PlatformRelease> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].tag_name, "v1.2.3");
        assert!(releases[0].published_at.is_some());
    }

    mod http {
        use super::*;
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test(flavor = "multi_thread")]
        async fn client_sends_token_and_pages() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/repos/acme/billing/releases"))
                .and(query_param("page", "1"))
                .and(query_param("per_page", "100"))
                .and(header("authorization", "Bearer secret-token"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"[{"tag_name":"v1.1.0","html_url":"https://x/v1.1.0","published_at":"2024-02-01T00:00:00Z"},
                        {"tag_name":"v1.0.0","html_url":"https://x/v1.0.0","published_at":"2024-01-01T00:00:00Z"}]"#,
                ))
                .mount(&server)
                .await;

            let base = server.uri();
            let range = tokio::task::spawn_blocking(move || {
                let client = GithubClient::new(&base, "acme/billing", "secret-token")?;
                resolve_range(&client, "1.0.0", "1.1.0")
            })
            .await
            .unwrap()
            .unwrap();

            assert!(!range.is_rollback);
            assert_eq!(tags(&range), ["v1.1.0"]);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn not_found_maps_to_repository_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/repos/acme/missing/releases"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let base = server.uri();
            let err = tokio::task::spawn_blocking(move || {
                let client = GithubClient::new(&base, "acme/missing", "t")?;
                client.page(1, PAGE_SIZE)
            })
            .await
            .unwrap()
            .unwrap_err();

            assert!(matches!(err, GithubError::RepositoryNotFound(ref r) if r == "acme/missing"));
        }
    }
}
