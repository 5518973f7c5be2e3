//! Git introspection: status, diff, log.

use crate::commands::usage_error;
use crate::session::SessionContext;
use crate::util::{git_diff, git_log, git_status, is_git_repo, truncate_chars};
use anyhow::Result;
use sonar_ui::theme;

const DIFF_PREVIEW_CHARS: usize = 1000;
const LOG_COUNT: usize = 5;

pub fn git(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let Some(sub) = args.first() else {
        return Err(usage_error("/git status|diff|log"));
    };
    if !is_git_repo(&ctx.root) {
        println!("{} Not a git repository", theme::warn_mark());
        return Ok(());
    }
    match sub.as_str() {
        "status" => {
            let status = git_status(&ctx.root)?;
            if status.trim().is_empty() {
                println!("{} Working tree clean", theme::ok_mark());
            } else {
                println!("{}", theme::bold(&theme::cyan("🔀 Git status")));
                println!("{status}");
            }
        }
        "diff" => {
            let diff = git_diff(&ctx.root)?;
            if diff.trim().is_empty() {
                println!("{} No changes", theme::warn_mark());
            } else {
                println!("{}", theme::bold(&theme::cyan("🔀 Git diff")));
                println!("{}", truncate_chars(&diff, DIFF_PREVIEW_CHARS));
            }
        }
        "log" => {
            let log = git_log(&ctx.root, LOG_COUNT)?;
            println!("{}", theme::bold(&theme::cyan("📜 Git log")));
            println!("{log}");
        }
        _ => return Err(usage_error("/git status|diff|log")),
    }
    Ok(())
}
