//! Announce command: post the release message to Slack.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use herald_core::announce as pipeline;
use herald_core::config::Config;
use herald_core::slack::SlackWebhook;

use super::SourceArgs;

/// Arguments for the `announce` subcommand.
#[derive(Args, Debug, Default)]
pub struct AnnounceArgs {
    /// Release source options.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Slack incoming webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true, value_name = "URL")]
    pub slack_webhook: Option<String>,

    /// Print the JSON payload instead of posting it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct AnnounceReport<'a> {
    posted: bool,
    app_name: &'a str,
    versions: Vec<&'a str>,
    rollback: bool,
    blocks: usize,
}

/// Post the announcement, or print its payload with `--dry-run`.
#[instrument(name = "cmd_announce", skip_all, fields(dry_run = args.dry_run))]
pub fn cmd_announce(
    args: AnnounceArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing announce command");

    let (options, collected) =
        super::resolve_and_collect(args.source, args.slack_webhook, !args.dry_run, config, cwd)?;

    if args.dry_run {
        let message = pipeline::build_message(&options, &collected);
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    let url = options
        .slack_webhook
        .as_deref()
        .context("slack webhook is not configured")?;
    let webhook = SlackWebhook::new(url).context("failed to create HTTP client")?;
    let message = pipeline::announce(&options, &collected, &webhook)
        .context("failed to post announcement")?;

    let versions: Vec<&str> = collected.releases.iter().map(|r| r.version.as_str()).collect();
    if global_json {
        let report = AnnounceReport {
            posted: true,
            app_name: &options.app_name,
            versions,
            rollback: collected.is_rollback,
            blocks: message.blocks.len(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} Announced {} {} for {}",
            "✓".green(),
            if versions.len() == 1 { "release" } else { "releases" },
            versions.join(", ").cyan(),
            options.app_name.bold()
        );
    }

    Ok(())
}
