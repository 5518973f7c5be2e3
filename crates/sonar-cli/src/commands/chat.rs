//! Conversation commands: ask, clear, history, compress, role.

use crate::commands::usage_error;
use crate::context::{assemble_context, build_system_prompt};
use crate::session::SessionContext;
use crate::util::truncate_chars;
use anyhow::Result;
use sonar_core::{ChatRequest, ConversationTurn, Role};
use sonar_llm::route_model;
use sonar_ui::{Spinner, render_markdown, theme};

pub fn ask(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let prompt = args.join(" ");
    if prompt.trim().is_empty() {
        return Err(usage_error("/ask <question>"));
    }
    handle_ask(&prompt, ctx)
}

/// One chat turn: assemble context, issue the request, then commit the new
/// turns. The conversation buffer is only touched after a successful reply
/// so a failed call leaves state exactly as it was.
pub fn handle_ask(prompt: &str, ctx: &mut SessionContext) -> Result<()> {
    let assembled = assemble_context(prompt, ctx)?;
    let system_prompt = build_system_prompt(ctx, &assembled.bundle);

    let mut turns = Vec::with_capacity(ctx.conversation.len() + 2);
    turns.push(ConversationTurn::system(system_prompt));
    turns.extend(ctx.conversation.turns().iter().cloned());
    turns.push(ConversationTurn::user(prompt));

    let mut model = ctx.settings.model.clone();
    if ctx.settings.smart_context {
        if let Some(suggested) = route_model(prompt) {
            if suggested != model {
                println!(
                    "{}",
                    theme::dim(&format!("smart route: using {suggested} for this query"))
                );
                model = suggested.to_string();
            }
        }
    }

    let spinner = Spinner::start("Thinking");
    let result = ctx.client.complete(&ChatRequest {
        model,
        temperature: ctx.settings.temperature,
        turns,
    });
    spinner.finish();
    let reply = result?;

    ctx.conversation.append(ConversationTurn::user(prompt));
    ctx.conversation
        .append(ConversationTurn::assistant(reply.text.clone()));
    ctx.conversation.truncate_to_window(ctx.settings.max_history);
    ctx.usage.record(&reply.usage);

    println!("{}", theme::bold(&theme::magenta("◈ Response:")));
    println!("{}", render_markdown(&reply.text));
    suggest_next("ask", ctx);
    Ok(())
}

/// Follow-up hints after a command, in the registry's vocabulary.
pub fn suggest_next(command: &str, ctx: &SessionContext) {
    if !ctx.settings.auto_suggest {
        return;
    }
    let suggestions: &[&str] = match command {
        "ask" => &["review", "test", "document"],
        "read" => &["edit", "review", "metrics"],
        "edit" => &["read", "test"],
        "review" => &["refactor", "edit"],
        _ => &[],
    };
    if !suggestions.is_empty() {
        let list = suggestions
            .iter()
            .map(|s| format!("/{s}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}", theme::dim(&format!("💡 try: {list}")));
    }
}

pub fn clear(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    ctx.conversation.clear(false);
    println!("{} Conversation cleared", theme::ok_mark());
    Ok(())
}

pub fn history(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if ctx.conversation.is_empty() {
        println!("{} No conversation history", theme::warn_mark());
        return Ok(());
    }
    println!(
        "{} {}",
        theme::bold("📜 History"),
        theme::dim(&format!("· {} turns", ctx.conversation.len()))
    );
    for turn in ctx.conversation.turns() {
        let (icon, label) = match turn.role {
            Role::User => ("👤", theme::cyan("user")),
            Role::Assistant => ("🤖", theme::magenta("assistant")),
            Role::System => ("⚙", theme::gray("system")),
        };
        println!("{icon} {label}: {}", truncate_chars(&turn.content, 100));
    }
    Ok(())
}

const DEFAULT_COMPRESS_KEEP: usize = 5;

pub fn compress(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let keep = match args.first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| usage_error("/compress [keep-last-n]"))?,
        None => DEFAULT_COMPRESS_KEEP,
    };

    let total = ctx.conversation.len();
    if total <= keep {
        println!(
            "{} Context not large enough to compress ({total} turns)",
            theme::warn_mark()
        );
        return Ok(());
    }

    let summary = summarize_prefix(ctx, keep);
    ctx.conversation.compress(keep, summary);
    println!(
        "{} Compressed {} turns; kept the last {keep}",
        theme::ok_mark(),
        total - keep
    );
    Ok(())
}

/// Synthetic summary of the turns about to be dropped: enough to keep the
/// model oriented without another network round-trip.
fn summarize_prefix(ctx: &SessionContext, keep: usize) -> String {
    let dropped = &ctx.conversation.turns()[..ctx.conversation.len() - keep];
    let topics: Vec<String> = dropped
        .iter()
        .filter(|t| t.role == Role::User)
        .take(3)
        .map(|t| truncate_chars(t.content.lines().next().unwrap_or(""), 60))
        .collect();
    if topics.is_empty() {
        format!("[Summary of {} earlier turns — context compressed]", dropped.len())
    } else {
        format!(
            "[Summary of {} earlier turns] Topics discussed: {}",
            dropped.len(),
            topics.join("; ")
        )
    }
}

pub fn role(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        let current = if ctx.settings.role.is_empty() {
            "(default assistant)".to_string()
        } else {
            ctx.settings.role.clone()
        };
        println!("{} {current}", theme::bold("🎭 Role:"));
        return Ok(());
    }
    let requested = args.join(" ");
    if requested == "clear" || requested == "reset" {
        ctx.settings.role.clear();
    } else {
        ctx.settings.role = requested;
    }
    ctx.save_settings()?;
    if ctx.settings.role.is_empty() {
        println!("{} Role reset to default", theme::ok_mark());
    } else {
        println!(
            "{} Role set to: {}",
            theme::ok_mark(),
            theme::magenta(&ctx.settings.role)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;

    #[test]
    fn successful_ask_appends_user_then_assistant() {
        let (mut ctx, _dir, calls) = test_ctx();
        handle_ask("say hi", &mut ctx).unwrap();

        assert_eq!(ctx.conversation.len(), 2);
        assert_eq!(ctx.conversation.turns()[0].role, Role::User);
        assert_eq!(ctx.conversation.turns()[0].content, "say hi");
        assert_eq!(ctx.conversation.turns()[1].role, Role::Assistant);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        // The request carries a system prompt plus the new user turn.
        assert_eq!(calls[0].turns.first().unwrap().role, Role::System);
        assert_eq!(calls[0].turns.last().unwrap().content, "say hi");
        drop(calls);
        assert_eq!(ctx.usage.requests, 1);
    }

    #[test]
    fn ask_routes_complex_queries_to_reasoning_model() {
        let (mut ctx, _dir, calls) = test_ctx();
        handle_ask("debug this memory leak for me", &mut ctx).unwrap();
        assert_eq!(
            calls.lock().unwrap()[0].model,
            sonar_core::SONAR_REASONING_MODEL
        );
    }

    #[test]
    fn ask_window_is_enforced_after_each_turn() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.settings.max_history = 2;
        for i in 0..5 {
            handle_ask(&format!("question {i}"), &mut ctx).unwrap();
        }
        assert!(ctx.conversation.len() <= 4);
        assert_eq!(ctx.conversation.turns().last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn compress_keeps_tail_and_reports_topics() {
        let (mut ctx, _dir, _calls) = test_ctx();
        for i in 0..8 {
            ctx.conversation
                .append(ConversationTurn::user(format!("topic {i}")));
        }
        compress(&["3".to_string()], &mut ctx).unwrap();
        assert_eq!(ctx.conversation.len(), 4);
        assert_eq!(ctx.conversation.turns()[0].role, Role::System);
        assert!(ctx.conversation.turns()[0].content.contains("topic 0"));
        assert_eq!(ctx.conversation.turns()[3].content, "topic 7");
    }

    #[test]
    fn compress_on_small_buffer_is_noop() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.conversation.append(ConversationTurn::user("only one"));
        compress(&[], &mut ctx).unwrap();
        assert_eq!(ctx.conversation.len(), 1);
    }

    #[test]
    fn role_set_and_clear_persist() {
        let (mut ctx, _dir, _calls) = test_ctx();
        role(&["pirate".to_string(), "captain".to_string()], &mut ctx).unwrap();
        assert_eq!(ctx.settings.role, "pirate captain");
        assert_eq!(ctx.store.load_settings().role, "pirate captain");

        role(&["clear".to_string()], &mut ctx).unwrap();
        assert!(ctx.settings.role.is_empty());
    }
}
