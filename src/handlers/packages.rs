//! `/dnf` and `/yum`: read-only package manager queries.

use super::helpers::truncate;
use super::{Context, Handler};
use crate::config::PackagesConfig;
use crate::error::HandlerResult;
use async_trait::async_trait;
use chatlog_proto::format::code_block;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Subcommands that never change the system.
const SUBCOMMANDS: &[&str] = &["info", "provides", "repolist", "repoquery"];

/// Leaves room for the code fence inside the platform's message limit.
const MAX_OUTPUT: usize = 4000;

const FAILED: &str = "Oops. Something went wrong!";

pub struct PackageHandler;

/// Build the package manager argument list from a command's arguments.
///
/// Returns `None` when the subcommand is not one of [`SUBCOMMANDS`].
/// Phones like to turn `--` into an em dash, so that is undone first.
pub fn package_args(raw: &str) -> Option<Vec<String>> {
    let raw = raw.replace('—', "--");
    let mut args: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    let sub = args.first()?;
    if !SUBCOMMANDS.contains(&sub.as_str()) {
        return None;
    }
    if sub == "info" || sub == "provides" {
        args.push("-q".to_string());
    }
    Some(args)
}

#[derive(Debug, PartialEq, Eq)]
enum RunResult {
    Output(String),
    Empty,
    Failed,
}

async fn run_query(config: &PackagesConfig, args: &[String]) -> RunResult {
    let child = Command::new(&config.binary)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(config.timeout(), child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(binary = %config.binary, error = %e, "Failed to run package manager");
            return RunResult::Failed;
        }
        Err(_) => {
            warn!(binary = %config.binary, ?args, "Package manager timed out");
            return RunResult::Failed;
        }
    };

    if !output.status.success() {
        warn!(binary = %config.binary, ?args, status = %output.status, "Package manager failed");
        return RunResult::Failed;
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim();
    if combined.is_empty() {
        RunResult::Empty
    } else {
        RunResult::Output(combined.to_string())
    }
}

#[async_trait]
impl Handler for PackageHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        let config = &ctx.state.config.packages;
        if !config.enabled {
            return ctx.reply("Package lookups are disabled here.").await;
        }
        if ctx.command.args.is_empty() {
            return ctx
                .reply("Don't know what to run, you gave no arguments")
                .await;
        }
        let Some(args) = package_args(ctx.command.args) else {
            return ctx
                .reply(&format!("Supported subcommands: {}", SUBCOMMANDS.join(", ")))
                .await;
        };

        debug!(sender = %ctx.sender_name(), ?args, "Running package query");
        match run_query(config, &args).await {
            RunResult::Output(out) => ctx.reply(&code_block(&truncate(&out, MAX_OUTPUT))).await,
            RunResult::Empty => ctx.reply("Nothing to print, output is empty").await,
            RunResult::Failed => ctx.reply(FAILED).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{group, text_message};
    use crate::handlers::tests::{last_text, run};
    use crate::state::tests::{NoFeeds, state_with};
    use crate::telegram::fake::user;
    use std::sync::Arc;

    #[test]
    fn args_are_filtered_and_quieted() {
        assert_eq!(
            package_args("info  bash").unwrap(),
            vec!["info", "bash", "-q"]
        );
        assert_eq!(
            package_args("repoquery —whatprovides /bin/sh").unwrap(),
            vec!["repoquery", "--whatprovides", "/bin/sh"]
        );
        assert_eq!(package_args("repolist").unwrap(), vec!["repolist"]);
        assert!(package_args("install bash").is_none());
        assert!(package_args("").is_none());
    }

    #[tokio::test]
    async fn echo_binary_output_is_fenced() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) =
            state_with(dir.path(), "[packages]\nbinary = \"/bin/echo\"", Arc::new(NoFeeds)).await;

        run(&state, &text_message(group(-1), 1, user(2, "Bob"), "/dnf info bash")).await;
        assert_eq!(last_text(&fake), "```\ninfo bash -q\n```");
    }

    #[tokio::test]
    async fn failing_binary_apologises() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) =
            state_with(dir.path(), "[packages]\nbinary = \"/bin/false\"", Arc::new(NoFeeds)).await;

        run(&state, &text_message(group(-1), 1, user(2, "Bob"), "/yum repolist")).await;
        assert_eq!(last_text(&fake), FAILED);

        let (state, fake) = state_with(
            dir.path(),
            "[packages]\nbinary = \"/nonexistent/dnf\"",
            Arc::new(NoFeeds),
        )
        .await;
        run(&state, &text_message(group(-1), 2, user(2, "Bob"), "/dnf info bash")).await;
        assert_eq!(last_text(&fake), FAILED);
    }

    #[tokio::test]
    async fn refusals() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state_with(
            dir.path(),
            "[packages]\nenabled = false",
            Arc::new(NoFeeds),
        )
        .await;
        run(&state, &text_message(group(-1), 1, user(2, "Bob"), "/dnf info bash")).await;
        assert_eq!(last_text(&fake), "Package lookups are disabled here.");

        let (state, fake) = crate::state::tests::state(dir.path()).await;
        run(&state, &text_message(group(-1), 2, user(2, "Bob"), "/dnf")).await;
        assert_eq!(last_text(&fake), "Don't know what to run, you gave no arguments");

        run(&state, &text_message(group(-1), 3, user(2, "Bob"), "/dnf remove kernel")).await;
        assert_eq!(
            last_text(&fake),
            "Supported subcommands: info, provides, repolist, repoquery"
        );
    }
}
