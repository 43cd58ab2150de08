//! End-to-end CLI tests.
//!
//! These run the compiled binary as a subprocess.

use std::fs;
use std::process;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HERALD_LOG_DIR", std::env::temp_dir().join("herald-cli-tests"))
        .env_remove("SLACK_WEBHOOK_URL")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("RUST_LOG");
    cmd
}

const CHANGELOG_RELEASE: &str = "\
# Changelog

### [1.2.0](https://github.com/acme/billing/compare/v1.1.0...v1.2.0) (2024-03-05)

### Features

* **api:** add invoice export ([abc1234](https://github.com/acme/billing/commit/abc1234))

### Bug Fixes

* **db:** fix PROJ-42 deadlock ([def5678](https://github.com/acme/billing/commit/def5678))
";

/// A repository whose last commit adds one release to CHANGELOG.md.
/// Returns `None` where git is unavailable.
fn repo_with_release() -> Option<TempDir> {
    let tmp = TempDir::new().unwrap();
    let git = |args: &[&str]| {
        process::Command::new("git")
            .current_dir(tmp.path())
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .output()
    };
    git(&["init", "-q"]).ok()?;
    fs::write(tmp.path().join("CHANGELOG.md"), "# Changelog\n").unwrap();
    git(&["add", "."]).ok()?;
    git(&["commit", "-q", "-m", "init"]).ok()?;
    fs::write(tmp.path().join("CHANGELOG.md"), CHANGELOG_RELEASE).unwrap();
    git(&["commit", "-q", "-am", "release 1.2.0"]).ok()?;
    Some(tmp)
}

fn dir(tmp: &TempDir) -> &str {
    tmp.path().to_str().unwrap()
}

fn stdout_json(output: &process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("announce"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn long_help_lists_environment() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SLACK_WEBHOOK_URL"))
        .stdout(predicate::str::contains("HERALD_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn announce_help_shows_source_flags() {
    cmd()
        .args(["announce", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--slack-webhook"))
        .stdout(predicate::str::contains("--changelog-source"))
        .stdout(predicate::str::contains("--dry-run"));
}

// =============================================================================
// Info & Doctor
// =============================================================================

#[test]
fn info_shows_name_and_version() {
    cmd()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_NAME")))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_json_is_valid() {
    let tmp = TempDir::new().unwrap();
    let output = cmd()
        .args(["-C", dir(&tmp), "info", "--json"])
        .assert()
        .success();
    let json = stdout_json(output.get_output());

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["config"]["changelog_source"], "file");
    assert_eq!(json["config"]["limits"]["max_message_chars"], 2800);
}

#[test]
fn doctor_json_reports_git() {
    let output = cmd().args(["doctor", "--json"]).assert().success();
    let json = stdout_json(output.get_output());
    assert!(json["git"].get("in_repository").is_some());
    assert!(json["environment"].is_array());
}

#[test]
fn doctor_masks_secrets() {
    cmd()
        .args(["doctor", "--json"])
        .env("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/TOPSECRET")
        .assert()
        .success()
        .stdout(predicate::str::contains("TOPSECRET").not());
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn quiet_and_verbose_accepted() {
    cmd().args(["-q", "info"]).assert().success();
    cmd().args(["-vv", "info"]).assert().success();
}

#[test]
fn color_choices_accepted() {
    for choice in ["auto", "always", "never"] {
        cmd().args(["--color", choice, "info"]).assert().success();
    }
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["-C", "/nonexistent/path/that/does/not/exist", "info"])
        .assert()
        .failure();
}

#[test]
fn no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn invalid_source_is_rejected() {
    cmd()
        .args(["preview", "--changelog-source", "gitlab"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// =============================================================================
// Preview & Announce
// =============================================================================

#[test]
fn preview_renders_latest_release() {
    let Some(repo) = repo_with_release() else {
        return;
    };

    cmd()
        .args(["-C", dir(&repo), "--color", "never", "preview"])
        .args(["--app-name", "Billing API", "--environment", "production"])
        .args(["--jira-host", "https://acme.atlassian.net"])
        .assert()
        .success()
        .stdout(predicate::str::contains("production | Billing API"))
        .stdout(predicate::str::contains("New release!"))
        .stdout(predicate::str::contains("1 Feature"))
        .stdout(predicate::str::contains("*api:* add invoice export"))
        .stdout(predicate::str::contains(
            "PROJ-42 (https://acme.atlassian.net/browse/PROJ-42)",
        ));
}

#[test]
fn preview_json_is_block_kit() {
    let Some(repo) = repo_with_release() else {
        return;
    };

    let output = cmd()
        .args(["-C", dir(&repo), "preview", "--json"])
        .assert()
        .success();
    let json = stdout_json(output.get_output());

    let blocks = json["blocks"].as_array().unwrap();
    assert_eq!(blocks[0]["type"], "header");
    assert_eq!(blocks[0]["text"]["text"], "Unknown application");
    assert_eq!(blocks[1]["type"], "divider");
    assert_eq!(blocks[2]["accessory"]["type"], "button");
}

#[test]
fn preview_uses_config_file() {
    let Some(repo) = repo_with_release() else {
        return;
    };
    fs::write(
        repo.path().join(".herald.toml"),
        "[announce]\napp_name = \"From Config\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", dir(&repo), "--color", "never", "preview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("From Config"));

    cmd()
        .args(["-C", dir(&repo), "--color", "never", "preview", "--app-name", "From Flag"])
        .assert()
        .success()
        .stdout(predicate::str::contains("From Flag"))
        .stdout(predicate::str::contains("From Config").not());
}

#[test]
fn preview_outside_repository_fails() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .args(["-C", dir(&tmp), "preview"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to collect releases"));
}

#[test]
fn announce_requires_webhook() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .args(["-C", dir(&tmp), "announce"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("slack-webhook is required"));
}

#[test]
fn github_source_requires_token() {
    cmd()
        .args(["preview", "--changelog-source", "github"])
        .args(["--previous-version", "1.0.0", "--new-version", "1.1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("github-token is required"));
}

#[test]
fn announce_dry_run_prints_payload() {
    let Some(repo) = repo_with_release() else {
        return;
    };

    let output = cmd()
        .args(["-C", dir(&repo), "announce", "--dry-run"])
        .assert()
        .success();
    let json = stdout_json(output.get_output());
    assert!(json["blocks"].as_array().is_some_and(|b| b.len() > 3));
}

#[tokio::test(flavor = "multi_thread")]
async fn announce_posts_to_webhook() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let Some(repo) = repo_with_release() else {
        return;
    };
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/T000/B000/XXXX"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let webhook = format!("{}/services/T000/B000/XXXX", server.uri());
    let repo_dir = repo.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        cmd()
            .args(["-C", repo_dir.to_str().unwrap(), "--color", "never", "announce"])
            .env("SLACK_WEBHOOK_URL", webhook)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Announced release"), "{stdout}");
    assert!(stdout.contains("1.2.0"), "{stdout}");
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn announce_reports_rejected_webhook() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let Some(repo) = repo_with_release() else {
        return;
    };
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .mount(&server)
        .await;

    let webhook = server.uri();
    let repo_dir = repo.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        cmd()
            .args(["-C", repo_dir.to_str().unwrap(), "announce"])
            .args(["--slack-webhook", &webhook])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("404"), "{stderr}");
    assert!(stderr.contains("no_service"), "{stderr}");
}
