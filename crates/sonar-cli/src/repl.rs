//! The input session loop: draw the box, await a line, clear the chrome,
//! dispatch. Runs forever until quit, EOF, or a force exit.

use crate::commands::{self, Outcome};
use crate::session::SessionContext;
use anyhow::Result;
use sonar_context::collect_project_files;
use sonar_core::SonarError;
use sonar_ui::input::{BoxChrome, LineOutcome, ReplState, read_line};
use sonar_ui::theme;

pub fn run(ctx: &mut SessionContext) -> Result<()> {
    let entries = commands::menu_entries();
    let mut state = ReplState::default();

    while !ctx.quit {
        let chrome = chrome_for(ctx);
        match read_line(&chrome, &entries, &mut state)? {
            LineOutcome::Submitted(line) => handle_line(line.trim(), ctx),
            LineOutcome::ToggleAutoRun => {
                ctx.auto_run = !ctx.auto_run;
                let label = if ctx.auto_run { "on" } else { "off" };
                println!("{}", theme::dim(&format!("auto-run {label}")));
            }
            LineOutcome::OpenEditor => {
                let editor = std::env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());
                println!(
                    "{}",
                    theme::dim(&format!(
                        "external editor ({editor}) is not wired up in this build"
                    ))
                );
            }
            LineOutcome::Eof => {
                println!("{}", theme::cyan("👋 Thanks for using Sonar CLI!"));
                break;
            }
            LineOutcome::ForceExit => {
                println!("{}", theme::dim("Force quitting..."));
                break;
            }
        }
    }
    Ok(())
}

fn chrome_for(ctx: &SessionContext) -> BoxChrome {
    let auto = if ctx.auto_run { "on" } else { "off" };
    BoxChrome {
        cwd_line: format!("📍 {}", ctx.root.display()),
        status_line: format!(
            "{} · {} turns in memory · {} tokens · auto-run {auto}",
            ctx.settings.model,
            ctx.conversation.len(),
            ctx.usage.prompt_tokens + ctx.usage.completion_tokens,
        ),
    }
}

/// One submitted line. Every failure is caught here: one line to the
/// terminal, recorded for `/about`, and the loop continues.
pub fn handle_line(line: &str, ctx: &mut SessionContext) {
    if line.is_empty() {
        return;
    }
    if line == "@" {
        list_project_files(ctx);
        return;
    }
    if let Err(err) = route(line, ctx) {
        match err.downcast_ref::<SonarError>() {
            Some(SonarError::Parse { usage }) => {
                println!("{} Usage: {}", theme::warn_mark(), theme::cyan(usage));
            }
            _ => {
                println!("{} Error: {err}", theme::err_mark());
            }
        }
        ctx.last_error = Some(err.to_string());
        ctx.observer.warn_log(&format!("command failed: {err}"));
    }
}

fn route(line: &str, ctx: &mut SessionContext) -> Result<()> {
    match commands::dispatch(line, ctx)? {
        Outcome::Handled => Ok(()),
        Outcome::Unhandled => {
            if !line.starts_with('/') && ctx.settings.conversational_mode {
                return commands::chat::handle_ask(line, ctx);
            }
            println!(
                "{} Unknown command: {}",
                theme::err_mark(),
                theme::yellow(line.split_whitespace().next().unwrap_or(line))
            );
            println!("{}", theme::dim("Try /help"));
            Ok(())
        }
    }
}

fn list_project_files(ctx: &SessionContext) {
    let files = collect_project_files(&ctx.root, 2);
    if files.is_empty() {
        println!("{} No project files discovered", theme::warn_mark());
        return;
    }
    println!("{}", theme::bold(&theme::cyan("📁 Project files")));
    for (i, file) in files.iter().take(20).enumerate() {
        println!(
            "  {} 📄 {}",
            theme::gray(&format!("{:>2}.", i + 1)),
            theme::cyan(file)
        );
    }
    if files.len() > 20 {
        println!("{}", theme::dim(&format!("  ... and {} more", files.len() - 20)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;
    use sonar_core::Role;

    #[test]
    fn empty_input_dispatches_nothing() {
        let (mut ctx, _dir, calls) = test_ctx();
        handle_line("", &mut ctx);
        assert!(ctx.conversation.is_empty());
        assert!(calls.lock().unwrap().is_empty());
        assert!(ctx.last_error.is_none());
    }

    #[test]
    fn at_token_lists_files_without_contacting_the_api() {
        let (mut ctx, dir, calls) = test_ctx();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();
        handle_line("@", &mut ctx);
        assert!(calls.lock().unwrap().is_empty());
        assert!(ctx.conversation.is_empty());
    }

    #[test]
    fn conversational_mode_sends_free_text_as_user_turn() {
        let (mut ctx, _dir, calls) = test_ctx();
        ctx.settings.conversational_mode = true;
        handle_line("what is going on here", &mut ctx);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let last = calls[0].turns.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "what is going on here");
    }

    #[test]
    fn without_conversational_mode_free_text_is_unknown() {
        let (mut ctx, _dir, calls) = test_ctx();
        handle_line("what is going on here", &mut ctx);
        assert!(calls.lock().unwrap().is_empty());
        assert!(ctx.conversation.is_empty());
    }

    #[test]
    fn unknown_slash_command_never_falls_through_to_chat() {
        let (mut ctx, _dir, calls) = test_ctx();
        ctx.settings.conversational_mode = true;
        handle_line("/frobnicate now", &mut ctx);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_errors_are_caught_and_recorded() {
        let (mut ctx, _dir, _calls) = test_ctx();
        handle_line("/read ghost.txt", &mut ctx);
        let recorded = ctx.last_error.clone().unwrap();
        assert!(recorded.contains("ghost.txt"));
        // The loop keeps going: a later command still works.
        handle_line("/clear", &mut ctx);
    }

    #[test]
    fn parse_errors_echo_usage_and_continue() {
        let (mut ctx, _dir, _calls) = test_ctx();
        handle_line("/edit", &mut ctx);
        assert!(ctx.last_error.as_deref().unwrap_or("").contains("usage"));
    }
}
