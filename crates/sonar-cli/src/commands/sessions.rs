//! Session persistence and the snippet library.

use crate::commands::usage_error;
use crate::session::SessionContext;
use crate::util::{read_multiline, truncate_chars};
use anyhow::Result;
use chrono::Utc;
use sonar_core::{Conversation, SessionRecord, Snippet, SonarError};
use sonar_ui::theme;

pub fn session(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    match (args.first().map(String::as_str), args.get(1)) {
        (Some("save"), Some(tag)) => {
            let record = SessionRecord {
                saved_at: Utc::now(),
                root: ctx.root.clone(),
                history: ctx.conversation.turns().to_vec(),
                settings: ctx.settings.clone(),
            };
            ctx.store.save_session(tag, &record)?;
            println!("{} Session saved: {}", theme::ok_mark(), theme::cyan(tag));
        }
        (Some("load"), Some(tag)) | (Some("resume"), Some(tag)) => {
            let record = ctx.store.load_session(tag)?;
            ctx.conversation = Conversation::from_turns(record.history);
            if record.root.is_dir() {
                ctx.root = record.root;
            }
            println!(
                "{} Loaded {} {}",
                theme::ok_mark(),
                theme::cyan(tag),
                theme::dim(&format!(
                    "· {} turns · saved {}",
                    ctx.conversation.len(),
                    record.saved_at.to_rfc3339()
                ))
            );
        }
        (Some("list"), _) => {
            let sessions = ctx.store.list_sessions()?;
            if sessions.is_empty() {
                println!("{} No saved sessions", theme::warn_mark());
                return Ok(());
            }
            println!("{}", theme::bold(&theme::cyan("💾 Saved sessions")));
            for (tag, saved_at) in sessions {
                println!(
                    "  {} {}",
                    theme::cyan(&tag),
                    theme::dim(&format!("· {}", saved_at.to_rfc3339()))
                );
            }
        }
        _ => return Err(usage_error("/session save|load|list [tag]")),
    }
    Ok(())
}

pub fn snippet(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    match (args.first().map(String::as_str), args.get(1)) {
        (Some("save"), Some(name)) => {
            let code = read_multiline()?;
            ctx.snippets.insert(
                name.to_string(),
                Snippet {
                    code,
                    saved_at: Utc::now(),
                },
            );
            ctx.store.save_snippets(&ctx.snippets)?;
            println!("{} Snippet saved: {}", theme::ok_mark(), theme::cyan(name));
        }
        (Some("get"), Some(name)) => {
            let snippet = ctx.snippets.get(name.as_str()).ok_or(SonarError::NotFound {
                what: "snippet",
                name: name.to_string(),
            })?;
            println!("{}", theme::bold(&theme::cyan(&format!("✂ {name}"))));
            println!("{}", snippet.code);
        }
        (Some("list"), _) => {
            if ctx.snippets.is_empty() {
                println!("{} No saved snippets", theme::warn_mark());
                return Ok(());
            }
            println!("{}", theme::bold(&theme::cyan("✂ Code snippets")));
            for (name, snippet) in &ctx.snippets {
                let preview = snippet.code.lines().next().unwrap_or("");
                println!(
                    "  {} {}",
                    theme::cyan(name),
                    theme::dim(&format!("· {}", truncate_chars(preview, 50)))
                );
            }
        }
        _ => return Err(usage_error("/snippet save|get|list [name]")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;
    use sonar_core::ConversationTurn;

    #[test]
    fn session_save_then_load_restores_history() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.conversation.append(ConversationTurn::user("remember me"));
        session(&["save".to_string(), "work".to_string()], &mut ctx).unwrap();

        ctx.conversation.clear(false);
        assert!(ctx.conversation.is_empty());

        session(&["load".to_string(), "work".to_string()], &mut ctx).unwrap();
        assert_eq!(ctx.conversation.len(), 1);
        assert_eq!(ctx.conversation.turns()[0].content, "remember me");
    }

    #[test]
    fn loading_unknown_session_reports_not_found() {
        let (mut ctx, _dir, _calls) = test_ctx();
        let err = session(&["load".to_string(), "ghost".to_string()], &mut ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SonarError>(),
            Some(SonarError::NotFound { .. })
        ));
    }

    #[test]
    fn snippet_get_unknown_is_not_found() {
        let (mut ctx, _dir, _calls) = test_ctx();
        let err = snippet(&["get".to_string(), "nope".to_string()], &mut ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SonarError>(),
            Some(SonarError::NotFound { .. })
        ));
    }

    #[test]
    fn bad_subcommand_echoes_usage() {
        let (mut ctx, _dir, _calls) = test_ctx();
        assert!(session(&[], &mut ctx).is_err());
        assert!(snippet(&["frobnicate".to_string()], &mut ctx).is_err());
    }
}
