//! Session-level commands: help, about, settings, alias, usage, quit.

use crate::commands::{registry, usage_error};
use crate::session::SessionContext;
use anyhow::Result;
use sonar_core::Settings;
use sonar_ui::theme;

pub fn help(_args: &[String], _ctx: &mut SessionContext) -> Result<()> {
    println!("{}", theme::bold(&theme::cyan("Commands")));
    let width = registry().iter().map(|d| d.usage.len()).max().unwrap_or(0);
    for descriptor in registry() {
        println!(
            "  {}{}  {}",
            theme::cyan(descriptor.usage),
            " ".repeat(width - descriptor.usage.len()),
            theme::dim(descriptor.description)
        );
    }
    println!();
    println!(
        "{}",
        theme::dim("Free text chats directly when conversationalMode is on; otherwise use /ask.")
    );
    println!(
        "{}",
        theme::dim("Type @ alone to list project files; mention @path in a question to include it.")
    );
    Ok(())
}

pub fn about(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    println!(
        "{} {}",
        theme::bold("Sonar CLI Agent"),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} {}", theme::dim("model:"), ctx.settings.model);
    println!("{} {}", theme::dim("root: "), ctx.root.display());
    if let Some(err) = &ctx.last_error {
        println!("{} {}", theme::dim("last error:"), theme::red(err));
    }
    Ok(())
}

pub fn settings(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.first().map(String::as_str) == Some("set") {
        let (Some(key), Some(_)) = (args.get(1), args.get(2)) else {
            return Err(usage_error("/settings set <key> <value>"));
        };
        let value = args[2..].join(" ");
        ctx.settings.set(key, &value)?;
        ctx.save_settings()?;
        println!(
            "{} {} = {}",
            theme::ok_mark(),
            theme::cyan(key),
            theme::yellow(&value)
        );
        return Ok(());
    }
    if !args.is_empty() {
        return Err(usage_error("/settings [set <key> <value>]"));
    }

    println!("{}", theme::bold(&theme::cyan("⚙ Settings")));
    let rendered = serde_json::to_value(&ctx.settings)?;
    if let Some(map) = rendered.as_object() {
        for key in Settings::KEYS {
            if let Some(value) = map.get(*key) {
                println!("  {} {}", theme::dim(&format!("{key}:")), value);
            }
        }
        if !ctx.settings.aliases.is_empty() {
            println!("  {} {}", theme::dim("aliases:"), ctx.settings.aliases.len());
        }
    }
    println!();
    println!("{}", theme::dim("Change with: /settings set <key> <value>"));
    println!(
        "{}",
        theme::dim("Models: sonar-pro, sonar-reasoning, sonar")
    );
    Ok(())
}

pub fn alias(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    match args.first().map(String::as_str) {
        None => {
            if ctx.settings.aliases.is_empty() {
                println!("{} No aliases defined", theme::warn_mark());
                return Ok(());
            }
            println!("{}", theme::bold(&theme::cyan("Aliases")));
            for (name, expansion) in &ctx.settings.aliases {
                println!("  {} → {}", theme::cyan(name), expansion);
            }
            Ok(())
        }
        Some("remove") => {
            let Some(name) = args.get(1) else {
                return Err(usage_error("/alias remove <name>"));
            };
            if ctx.settings.aliases.remove(name.as_str()).is_none() {
                println!("{} No such alias: {name}", theme::warn_mark());
                return Ok(());
            }
            ctx.save_settings()?;
            println!("{} Removed alias {}", theme::ok_mark(), theme::cyan(name));
            Ok(())
        }
        Some(name) => {
            if args.len() < 2 {
                return Err(usage_error("/alias [name expansion...] | /alias remove <name>"));
            }
            if registry().iter().any(|d| d.name == name) {
                println!(
                    "{} '{name}' is a built-in command and cannot be aliased",
                    theme::warn_mark()
                );
                return Ok(());
            }
            let expansion = args[1..].join(" ");
            ctx.settings
                .aliases
                .insert(name.to_string(), expansion.clone());
            ctx.save_settings()?;
            println!(
                "{} {} → {}",
                theme::ok_mark(),
                theme::cyan(name),
                expansion
            );
            Ok(())
        }
    }
}

pub fn usage(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    println!("{}", theme::bold(&theme::teal("📊 Token usage")));
    println!(
        "  {} {}",
        theme::dim("requests:         "),
        ctx.usage.requests
    );
    println!(
        "  {} {}",
        theme::dim("prompt tokens:    "),
        theme::yellow(&ctx.usage.prompt_tokens.to_string())
    );
    println!(
        "  {} {}",
        theme::dim("completion tokens:"),
        theme::yellow(&ctx.usage.completion_tokens.to_string())
    );
    println!(
        "  {} {}",
        theme::dim("estimated cost:   "),
        theme::green(&format!("${:.4}", ctx.usage.cost_usd))
    );
    println!(
        "  {} {}",
        theme::dim("memory:           "),
        format!("{} turns", ctx.conversation.len())
    );
    Ok(())
}

pub fn quit(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    ctx.quit = true;
    println!("{}", theme::cyan("👋 Thanks for using Sonar CLI!"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;

    #[test]
    fn settings_set_updates_and_persists() {
        let (mut ctx, _dir, _calls) = test_ctx();
        settings(
            &["set".to_string(), "maxHistory".to_string(), "4".to_string()],
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.settings.max_history, 4);
        assert_eq!(ctx.store.load_settings().max_history, 4);
    }

    #[test]
    fn settings_set_unknown_key_is_parse_error() {
        let (mut ctx, _dir, _calls) = test_ctx();
        let err = settings(
            &["set".to_string(), "bogus".to_string(), "1".to_string()],
            &mut ctx,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<sonar_core::SonarError>(),
            Some(sonar_core::SonarError::Parse { .. })
        ));
    }

    #[test]
    fn alias_define_list_remove_cycle() {
        let (mut ctx, _dir, _calls) = test_ctx();
        alias(
            &["gs".to_string(), "git".to_string(), "status".to_string()],
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.settings.aliases["gs"], "git status");

        alias(&["remove".to_string(), "gs".to_string()], &mut ctx).unwrap();
        assert!(ctx.settings.aliases.is_empty());
    }

    #[test]
    fn builtin_names_cannot_be_shadowed() {
        let (mut ctx, _dir, _calls) = test_ctx();
        alias(
            &["help".to_string(), "quit".to_string()],
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.settings.aliases.is_empty());
    }

    #[test]
    fn quit_sets_the_flag() {
        let (mut ctx, _dir, _calls) = test_ctx();
        quit(&[], &mut ctx).unwrap();
        assert!(ctx.quit);
    }
}
