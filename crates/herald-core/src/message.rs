//! Slack message composition.
//!
//! [`compose`] turns releases (and optional diff stats) into a [`Message`]:
//! an ordered list of Block Kit [`Block`]s that serializes directly into the
//! webhook payload.
//!
//! Two size limits apply:
//!
//! - **Per category**: a features or bugfixes list stops before it would
//!   exceed [`Limits::max_category_chars`] and ends with an
//!   `...and N more items` line.
//! - **Whole message**: when the serialized payload exceeds
//!   [`Limits::max_message_chars`], blocks are dropped from the end (the
//!   header, divider, and announcement always stay) and a truncation notice
//!   is appended.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::github::UNKNOWN_AUTHOR;
use crate::release::{ChangeEntry, ChangeKind, DiffStats, Release};
use crate::ticket;

/// Blocks that are never dropped: header, divider, announcement.
const MIN_BLOCKS: usize = 3;

// ──────────────────────────────────────────────
// Block model
// ──────────────────────────────────────────────

/// The webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Blocks in display order.
    pub blocks: Vec<Block>,
}

impl Message {
    /// Serialize to the JSON payload.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Length of the JSON payload in characters.
    pub fn serialized_len(&self) -> usize {
        self.to_json()
            .map_or(usize::MAX, |json| json.chars().count())
    }
}

/// One Block Kit block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Large plain-text title.
    Header {
        /// Title text.
        text: Text,
    },
    /// Horizontal rule.
    Divider,
    /// Markdown paragraph, optionally with a link button.
    Section {
        /// Paragraph text.
        text: Text,
        /// Link button shown beside the text.
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    /// Small, muted markdown text.
    Context {
        /// Context elements.
        elements: Vec<Text>,
    },
}

impl Block {
    fn header(text: impl Into<String>) -> Self {
        Self::Header {
            text: Text::plain(text),
        }
    }

    fn section(text: impl Into<String>) -> Self {
        Self::Section {
            text: Text::markdown(text),
            accessory: None,
        }
    }

    fn context(text: impl Into<String>) -> Self {
        Self::Context {
            elements: vec![Text::markdown(text)],
        }
    }

    /// Display text of the block (empty for dividers).
    pub fn text(&self) -> String {
        match self {
            Self::Header { text } | Self::Section { text, .. } => text.text.clone(),
            Self::Divider => String::new(),
            Self::Context { elements } => elements
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A Block Kit text object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Text {
    /// `plain_text` or `mrkdwn`.
    #[serde(rename = "type")]
    pub kind: TextKind,
    /// The text itself.
    pub text: String,
    /// Render `:emoji:` shortcodes (plain text only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl Text {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::PlainText,
            text: text.into(),
            emoji: Some(true),
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Mrkdwn,
            text: text.into(),
            emoji: None,
        }
    }
}

/// Text object formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    /// Literal text.
    PlainText,
    /// Slack markdown.
    Mrkdwn,
}

/// Interactive element attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    /// A link button.
    Button {
        /// Button label.
        text: Text,
        /// Target URL.
        url: String,
    },
}

// ──────────────────────────────────────────────
// Composition
// ──────────────────────────────────────────────

/// Size limits for a composed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum serialized payload length.
    pub max_message_chars: usize,
    /// Maximum length of one rendered change list.
    pub max_category_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_chars: 2800,
            max_category_chars: 1200,
        }
    }
}

/// Everything [`compose`] needs.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    /// Application display name.
    pub app_name: &'a str,
    /// Deployment environment label (e.g., `"production"`).
    pub environment: Option<&'a str>,
    /// Releases, newest first.
    pub releases: &'a [Release],
    /// Diff statistics for the whole range.
    pub stats: Option<DiffStats>,
    /// Ticket tracker base URL; enables ticket links.
    pub ticket_base_url: Option<&'a str>,
    /// Whether these releases are being rolled back.
    pub is_rollback: bool,
    /// Size limits.
    pub limits: Limits,
}

/// Pluralize `word` when `count` is greater than one.
///
/// Zero stays singular ("0 file changed").
pub fn plural(word: &str, count: u64) -> String {
    if count <= 1 {
        word.to_string()
    } else if word.ends_with('x') {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// Compose the announcement message.
pub fn compose(input: &ComposeInput<'_>) -> Message {
    let features = sorted_changes(input.releases, ChangeKind::Feature);
    let bugfixes = sorted_changes(input.releases, ChangeKind::Bugfix);

    let mut blocks = vec![
        Block::header(header_text(input.app_name, input.environment)),
        Block::Divider,
        announcement(input.releases, input.is_rollback),
    ];

    if !input.releases.is_empty() {
        blocks.push(Block::context(release_lines(input.releases)));
    }

    if input.is_rollback {
        blocks.push(Block::section(rollback_advisory(input.environment)));
    }

    for (kind, changes) in [
        (ChangeKind::Feature, &features),
        (ChangeKind::Bugfix, &bugfixes),
    ] {
        if changes.is_empty() {
            continue;
        }
        blocks.push(Block::Divider);
        blocks.push(Block::section(category_header(kind, changes.len())));
        blocks.push(Block::section(render_changes(
            changes,
            input.ticket_base_url,
            input.limits.max_category_chars,
        )));
    }

    if features.is_empty() && bugfixes.is_empty() {
        blocks.push(Block::section("*No changes found* :shrug:"));
    }

    if let Some(stats) = input.stats {
        blocks.push(Block::Divider);
        blocks.push(Block::context(stats_line(stats)));
    }

    let notice = truncation_notice(input.releases);
    let message = fit_to_budget(Message { blocks }, input.limits.max_message_chars, notice);
    debug!(
        blocks = message.blocks.len(),
        size = message.serialized_len(),
        "message composed"
    );
    message
}

fn sorted_changes(releases: &[Release], kind: ChangeKind) -> Vec<&ChangeEntry> {
    let mut changes: Vec<&ChangeEntry> = releases
        .iter()
        .flat_map(|release| release.changes(kind))
        .collect();
    changes.sort_by(|a, b| a.component.cmp(&b.component));
    changes
}

fn header_text(app_name: &str, environment: Option<&str>) -> String {
    match environment.filter(|e| !e.is_empty()) {
        Some(environment) => format!("{environment} | {app_name}"),
        None => app_name.to_string(),
    }
}

/// Oldest and newest release by date. Releases arrive newest first, so on
/// equal dates the later entry counts as older.
fn span(releases: &[Release]) -> Option<(&Release, &Release)> {
    let oldest = releases
        .iter()
        .enumerate()
        .min_by_key(|(i, r)| (r.release_date, Reverse(*i)))?;
    let newest = releases
        .iter()
        .enumerate()
        .max_by_key(|(i, r)| (r.release_date, Reverse(*i)))?;
    Some((oldest.1, newest.1))
}

fn span_text(releases: &[Release]) -> Option<String> {
    let (oldest, newest) = span(releases)?;
    if releases.len() == 1 {
        return Some(format!("*{}* ({})", newest.version, newest.release_date));
    }
    Some(format!(
        "*{}* → *{}* ({} → {})",
        oldest.version, newest.version, oldest.release_date, newest.release_date
    ))
}

fn announcement(releases: &[Release], is_rollback: bool) -> Block {
    let versions = plural("Version", releases.len() as u64);
    let span = span_text(releases).unwrap_or_default();
    let text = if is_rollback {
        format!(":warning: *Release rolled back!* {versions} {span} rolled back")
    } else {
        format!(":tada: *New release!* {versions} {span} deployed")
    };

    let accessory = match releases {
        [release] => Some(Accessory::Button {
            text: Text::plain("View release"),
            url: release.release_url.clone(),
        }),
        _ => None,
    };

    Block::Section {
        text: Text::markdown(text),
        accessory,
    }
}

fn release_lines(releases: &[Release]) -> String {
    releases
        .iter()
        .map(|r| {
            format!(
                "*{}*  |  {} (<{}|View>)",
                r.version, r.release_date, r.release_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn rollback_advisory(environment: Option<&str>) -> String {
    match environment.filter(|e| !e.is_empty()) {
        Some(environment) => {
            format!(":rewind: The changes below are no longer active in *{environment}*.")
        }
        None => ":rewind: The changes below are no longer active.".to_string(),
    }
}

fn category_header(kind: ChangeKind, count: usize) -> String {
    let count = count as u64;
    match kind {
        ChangeKind::Feature => format!("*:sparkles: {count} {}*", plural("Feature", count)),
        ChangeKind::Bugfix => format!("*:bug: {count} {}*", plural("Bugfix", count)),
    }
}

fn render_change(entry: &ChangeEntry, ticket_base_url: Option<&str>) -> String {
    let message = match entry.ticket_ref.as_deref() {
        Some(ticket) => ticket::link_ticket(&entry.message, ticket, ticket_base_url),
        None => entry.message.clone(),
    };
    let author = match entry.author.as_deref() {
        Some(author) if author != UNKNOWN_AUTHOR => format!(" (@{author})"),
        _ => String::new(),
    };
    format!(
        "• *{}:* {message}{author} (<{}|View>)",
        entry.component, entry.change_url
    )
}

/// Render a change list, stopping before it would exceed `budget` characters.
fn render_changes(changes: &[&ChangeEntry], ticket_base_url: Option<&str>, budget: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0;

    for (index, entry) in changes.iter().enumerate() {
        let line = render_change(entry, ticket_base_url);
        let cost = line.chars().count() + usize::from(index > 0);
        if used + cost > budget {
            let remaining = (changes.len() - index) as u64;
            lines.push(format!(
                "_...and {remaining} more {}_",
                plural("item", remaining)
            ));
            break;
        }
        used += cost;
        lines.push(line);
    }

    lines.join("\n")
}

fn stats_line(stats: DiffStats) -> String {
    let DiffStats {
        files_changed,
        insertions,
        deletions,
    } = stats;
    format!(
        ":page_facing_up: {files_changed} {} changed  |  :heavy_plus_sign: {insertions} {}  |  :heavy_minus_sign: {deletions} {}",
        plural("file", files_changed),
        plural("insertion", insertions),
        plural("deletion", deletions),
    )
}

fn truncation_notice(releases: &[Release]) -> Block {
    match span(releases) {
        Some((_, newest)) => Block::context(format!(
            ":scissors: _Message truncated. <{}|See the full changelog>._",
            newest.release_url
        )),
        None => Block::context(":scissors: _Message truncated._"),
    }
}

/// Drop trailing blocks until the message plus `notice` fits in `max`.
fn fit_to_budget(mut message: Message, max: usize, notice: Block) -> Message {
    if message.serialized_len() <= max {
        return message;
    }

    let original = message.blocks.len();
    loop {
        message.blocks.push(notice.clone());
        let fits = message.serialized_len() <= max;
        message.blocks.pop();
        if fits || message.blocks.len() <= MIN_BLOCKS {
            break;
        }
        message.blocks.pop();
    }
    message.blocks.push(notice);

    warn!(
        dropped = original + 1 - message.blocks.len(),
        max, "message too large, truncated"
    );
    message
}
