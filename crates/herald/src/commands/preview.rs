//! Preview command: render the message without posting it.

use std::sync::LazyLock;

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use regex::Regex;
use tracing::{debug, instrument};

use herald_core::announce as pipeline;
use herald_core::config::Config;
use herald_core::message::{Accessory, Block, Message};

use super::SourceArgs;

/// Arguments for the `preview` subcommand.
#[derive(Args, Debug, Default)]
pub struct PreviewArgs {
    /// Release source options.
    #[command(flatten)]
    pub source: SourceArgs,
}

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?P<url>[^|>]+)\|(?P<label>[^>]+)>").expect("valid link pattern"));

/// Slack `<url|label>` links as `label (url)` for terminal display.
pub fn plain_links(text: &str) -> String {
    LINK.replace_all(text, "$label ($url)").into_owned()
}

/// Print the message that `announce` would post.
#[instrument(name = "cmd_preview", skip_all)]
pub fn cmd_preview(
    args: PreviewArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing preview command");

    let (options, collected) = super::resolve_and_collect(args.source, None, false, config, cwd)?;
    let message = pipeline::build_message(&options, &collected);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message(&message);
        println!();
        println!(
            "{}",
            format!("{} characters", message.serialized_len()).dimmed()
        );
    }
    Ok(())
}

fn print_message(message: &Message) {
    for block in &message.blocks {
        match block {
            Block::Header { text } => println!("{}", text.text.bold()),
            Block::Divider => println!("{}", "─".repeat(40).dimmed()),
            Block::Section { text, accessory } => {
                println!("{}", plain_links(&text.text));
                if let Some(Accessory::Button { text, url }) = accessory {
                    println!("  [{}] {}", text.text.bold(), url.cyan());
                }
            }
            Block::Context { .. } => println!("{}", plain_links(&block.text()).dimmed()),
        }
    }
}
