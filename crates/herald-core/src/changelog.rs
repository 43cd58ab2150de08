//! Changelog parsing: markdown text into [`Release`] records.
//!
//! The parser is a two-state machine driven one line at a time:
//!
//! - `NoRelease`: before the first release header. Everything is
//!   ignored until a header shows up.
//! - `InRelease`: collecting changes for the current release. A
//!   section heading selects which list bullets go into; the next release
//!   header (or end of input) flushes the release.
//!
//! Each line is classified into a `Line` first, then fed through
//! `State::step`. Bullets that sit under a recognized section but do not
//! have the expected `* **component:** message ([hash](url))` shape are
//! dropped and counted in [`ChangelogParse::dropped_lines`].

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::release::{self, ChangeEntry, DEFAULT_COMPONENT, Release};
use crate::ticket;

static RELEASE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:#{1,3}\s+)?\[(?P<version>[^\]\s]+)\]\((?P<url>https?://[^)\s]+)\)\s+\((?P<date>\d{4}-\d{2}-\d{2})\)",
    )
    .expect("valid release header pattern")
});

static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{2,4}\s+(?P<title>.+?)\s*$").expect("valid section heading pattern")
});

static CHANGE_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[*-]\s+(?:\*\*(?P<component>[^*:]+):\*\*\s+)?(?P<message>.+?)\s*\(\[(?P<hash>[0-9a-fA-F]{7,40})\]\((?P<url>https?://[^)\s]+)\)\)",
    )
    .expect("valid change item pattern")
});

/// Result of parsing a changelog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangelogParse {
    /// Releases in the order their headers appeared.
    pub releases: Vec<Release>,
    /// Bullets under a Features/Bug Fixes section that could not be parsed.
    pub dropped_lines: usize,
}

/// Parse changelog text into releases, discarding the dropped-line count.
pub fn parse_releases(text: &str) -> Vec<Release> {
    parse_changelog(text).releases
}

/// Parse changelog text into releases.
///
/// Text without any recognizable release header yields no releases; that is
/// not an error here, the caller decides whether it is.
pub fn parse_changelog(text: &str) -> ChangelogParse {
    let mut parse = ChangelogParse::default();
    let mut state = State::NoRelease;

    for raw in text.lines() {
        state = state.step(classify(raw), &mut parse);
    }
    state.finish(&mut parse);

    if parse.dropped_lines > 0 {
        warn!(
            dropped = parse.dropped_lines,
            "skipped changelog bullets that did not match the expected format"
        );
    }
    debug!(releases = parse.releases.len(), "changelog parsed");
    parse
}

/// Which change list bullets are currently routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Features,
    BugFixes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReleaseHeader {
    version: String,
    url: String,
    date: NaiveDate,
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    ReleaseHeader(ReleaseHeader),
    /// A sub-heading; `None` for headings other than Features/Bug Fixes.
    SectionHeading(Option<Section>),
    Bullet(&'a str),
    Other,
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();

    if let Some(caps) = RELEASE_HEADER.captures(line) {
        let version = &caps["version"];
        let date = &caps["date"];
        if let Err(e) = semver::Version::parse(version) {
            warn!(%version, %e, "release header has an invalid version, ignoring");
            return Line::Other;
        }
        let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            warn!(%version, %date, "release header has an invalid date, ignoring");
            return Line::Other;
        };
        return Line::ReleaseHeader(ReleaseHeader {
            version: version.to_string(),
            url: caps["url"].to_string(),
            date,
        });
    }

    if let Some(caps) = SECTION_HEADING.captures(line) {
        let section = match &caps["title"] {
            "Features" => Some(Section::Features),
            "Bug Fixes" => Some(Section::BugFixes),
            _ => None,
        };
        return Line::SectionHeading(section);
    }

    if line.starts_with("* ") || line.starts_with("- ") {
        return Line::Bullet(line);
    }

    Line::Other
}

/// A release whose header has been seen but which has not been flushed yet.
#[derive(Debug)]
struct ReleaseBuilder {
    header: ReleaseHeader,
    section: Option<Section>,
    features: Vec<ChangeEntry>,
    bugfixes: Vec<ChangeEntry>,
}

impl ReleaseBuilder {
    const fn new(header: ReleaseHeader) -> Self {
        Self {
            header,
            section: None,
            features: Vec::new(),
            bugfixes: Vec::new(),
        }
    }

    fn push_bullet(&mut self, line: &str, dropped: &mut usize) {
        let list = match self.section {
            Some(Section::Features) => &mut self.features,
            Some(Section::BugFixes) => &mut self.bugfixes,
            None => return,
        };

        let Some(entry) = parse_change_item(line) else {
            debug!(%line, "dropping malformed changelog bullet");
            *dropped += 1;
            return;
        };

        // The same change shows up once per commit when it was squashed from several.
        if list.iter().any(|existing| existing.same_change(&entry)) {
            debug!(component = %entry.component, message = %entry.message, "duplicate change skipped");
            return;
        }
        list.push(entry);
    }

    fn finish(self) -> Release {
        let (previous_version_tag, version_tag) = release::tags_from_url(&self.header.url);
        Release {
            version: self.header.version,
            version_tag,
            previous_version_tag,
            release_url: self.header.url,
            release_date: self.header.date,
            features: self.features,
            bugfixes: self.bugfixes,
        }
    }
}

#[derive(Debug)]
enum State {
    NoRelease,
    InRelease(ReleaseBuilder),
}

impl State {
    fn step(self, line: Line<'_>, parse: &mut ChangelogParse) -> Self {
        match (self, line) {
            (state, Line::ReleaseHeader(header)) => {
                state.finish(parse);
                debug!(version = %header.version, "release header");
                Self::InRelease(ReleaseBuilder::new(header))
            }
            (Self::InRelease(mut builder), Line::SectionHeading(section)) => {
                builder.section = section;
                Self::InRelease(builder)
            }
            (Self::InRelease(mut builder), Line::Bullet(text)) => {
                builder.push_bullet(text, &mut parse.dropped_lines);
                Self::InRelease(builder)
            }
            (state, _) => state,
        }
    }

    fn finish(self, parse: &mut ChangelogParse) {
        if let Self::InRelease(builder) = self {
            parse.releases.push(builder.finish());
        }
    }
}

fn parse_change_item(line: &str) -> Option<ChangeEntry> {
    let caps = CHANGE_ITEM.captures(line)?;
    let message = caps["message"].trim().to_string();
    let component = caps
        .name("component")
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COMPONENT)
        .to_string();

    Some(ChangeEntry {
        ticket_ref: ticket::extract_ticket(&message),
        component,
        message,
        change_url: caps["url"].to_string(),
        author: None,
    })
}
