//! Command registry and dispatcher.
//!
//! The registry is built once at startup and never changes; it drives
//! dispatch, `/help` output and the autocomplete dropdown alike.

pub mod brain;
pub mod chat;
pub mod files;
pub mod gitops;
pub mod nav;
pub mod sessions;
pub mod system;
pub mod tools;

use crate::session::SessionContext;
use anyhow::Result;
use sonar_core::SonarError;
use sonar_ui::MenuEntry;

type Handler = fn(&[String], &mut SessionContext) -> Result<()>;

/// One registered command: declared as data so help and autocomplete are
/// generated from the same table the dispatcher uses.
pub struct CommandDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: Handler,
}

macro_rules! command {
    ($name:literal, $usage:literal, $desc:literal, $handler:path) => {
        CommandDescriptor {
            name: $name,
            description: $desc,
            usage: $usage,
            handler: $handler,
        }
    };
}

/// Registry order is display order for `/help` and the dropdown.
pub fn registry() -> &'static [CommandDescriptor] {
    static REGISTRY: &[CommandDescriptor] = &[
        command!("about", "/about", "Version and session information", system::about),
        command!("alias", "/alias [name expansion...]", "List or define command aliases", system::alias),
        command!("ask", "/ask <question>", "Chat with the assistant (reads project files)", chat::ask),
        command!("brain", "/brain init|show|update", "Manage the project brain summary", brain::brain),
        command!("cd", "/cd <dir>", "Change the working root (stays inside the project)", nav::cd),
        command!("clear", "/clear", "Clear the conversation history", chat::clear),
        command!("commit", "/commit", "Generate a commit message from the git diff", tools::commit),
        command!("compress", "/compress [keep]", "Compress old turns into a summary turn", chat::compress),
        command!("cp", "/cp <src> <dest>", "Copy a file or directory", files::cp),
        command!("deps", "/deps", "List project dependencies", nav::deps),
        command!("document", "/document <file>", "Generate documentation for a file", tools::document),
        command!("edit", "/edit <file> <instruction>", "AI-assisted file editing with diff preview", tools::edit),
        command!("exit", "/exit", "Leave the session", system::quit),
        command!("find", "/find <pattern> [dir]", "Find files by name pattern", nav::find),
        command!("git", "/git status|diff|log", "Git introspection", gitops::git),
        command!("grep", "/grep <pattern>", "Search project files for text", nav::grep),
        command!("help", "/help", "Show all commands", system::help),
        command!("history", "/history", "Show the conversation buffer", chat::history),
        command!("ls", "/ls [dir]", "List a directory", nav::ls),
        command!("metrics", "/metrics <file>", "Line and comment counts for a file", tools::metrics),
        command!("mkdir", "/mkdir <dir>", "Create a directory", files::mkdir),
        command!("mv", "/mv <src> <dest>", "Move or rename a path", files::mv),
        command!("quit", "/quit", "Leave the session", system::quit),
        command!("read", "/read <file>", "Print a file with line numbers", files::read),
        command!("refactor", "/refactor <file>", "AI-assisted refactoring", tools::refactor),
        command!("restore", "/restore <file>", "Restore a file from its latest backup", files::restore),
        command!("review", "/review <file>", "AI code review", tools::review),
        command!("role", "/role [persona|clear]", "Show or set the assistant persona", chat::role),
        command!("rm", "/rm <path>", "Delete a file or directory (asks first)", files::rm),
        command!("root", "/root", "Show the working root", nav::root),
        command!("scaffold", "/scaffold <type> <name>", "Generate a component skeleton", tools::scaffold),
        command!("session", "/session save|load|list [tag]", "Save or resume a session", sessions::session),
        command!("settings", "/settings [set <key> <value>]", "Show or change settings", system::settings),
        command!("snippet", "/snippet save|get|list [name]", "Manage the snippet library", sessions::snippet),
        command!("stat", "/stat <path>", "File metadata", nav::stat),
        command!("test", "/test <file>", "Generate tests for a file", tools::test_gen),
        command!("todo", "/todo", "Scan for TODO/FIXME markers", nav::todo),
        command!("tree", "/tree [dir]", "Directory tree", nav::tree),
        command!("usage", "/usage", "Token usage and estimated cost", system::usage),
        command!("write", "/write <file>", "Write pasted content to a file", files::write),
    ];
    REGISTRY
}

/// Registry view used by the autocomplete dropdown.
pub fn menu_entries() -> Vec<MenuEntry> {
    registry()
        .iter()
        .map(|d| MenuEntry::new(d.name, d.description))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Unhandled,
}

/// Parse and route one submitted line.
///
/// The first token (with one leading `/` stripped) names the command;
/// user aliases expand once, before argument parsing, and are never
/// expanded recursively. Unknown names return `Unhandled` so the caller
/// can decide between free-text chat and an error message.
pub fn dispatch(raw: &str, ctx: &mut SessionContext) -> Result<Outcome> {
    let tokens = shell_words::split(raw).map_err(|_| SonarError::Parse {
        usage: "unbalanced quotes in command line".to_string(),
    })?;
    let Some(first) = tokens.first() else {
        return Ok(Outcome::Unhandled);
    };

    let mut name = first.strip_prefix('/').unwrap_or(first).to_string();
    let mut args: Vec<String> = tokens[1..].to_vec();

    if let Some(expansion) = ctx.settings.aliases.get(&name).cloned() {
        let mut expanded = shell_words::split(&expansion).unwrap_or_default();
        if !expanded.is_empty() {
            let head = expanded.remove(0);
            name = head.strip_prefix('/').unwrap_or(&head).to_string();
            expanded.append(&mut args);
            args = expanded;
        }
    }

    // Names are compared exactly: commands are case-sensitive.
    let Some(descriptor) = registry().iter().find(|d| d.name == name) else {
        return Ok(Outcome::Unhandled);
    };
    ctx.observer.record(&format!("dispatch {}", descriptor.name));
    (descriptor.handler)(&args, ctx)?;
    Ok(Outcome::Handled)
}

/// `Parse` error carrying the command's usage string.
pub(crate) fn usage_error(usage: &str) -> anyhow::Error {
    SonarError::Parse {
        usage: usage.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;

    #[test]
    fn registry_names_are_unique_and_single_word() {
        let mut names: Vec<&str> = registry().iter().map(|d| d.name).collect();
        assert!(names.iter().all(|n| !n.contains(' ')));
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn unknown_command_is_unhandled() {
        let (mut ctx, _dir, _calls) = test_ctx();
        assert_eq!(dispatch("/definitely-not-a-command", &mut ctx).unwrap(), Outcome::Unhandled);
        assert_eq!(dispatch("also not one", &mut ctx).unwrap(), Outcome::Unhandled);
    }

    #[test]
    fn clear_command_empties_history_via_dispatch() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.conversation.append(sonar_core::ConversationTurn::user("hi"));
        assert_eq!(dispatch("/clear", &mut ctx).unwrap(), Outcome::Handled);
        assert!(ctx.conversation.is_empty());
    }

    #[test]
    fn alias_expands_once_before_parsing() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.settings
            .aliases
            .insert("cls".to_string(), "clear".to_string());
        ctx.conversation.append(sonar_core::ConversationTurn::user("hi"));
        assert_eq!(dispatch("/cls", &mut ctx).unwrap(), Outcome::Handled);
        assert!(ctx.conversation.is_empty());
    }

    #[test]
    fn alias_to_subcommand_carries_arguments() {
        let (mut ctx, _dir, _calls) = test_ctx();
        // `gs` expands to `git status`; both spellings must behave alike.
        ctx.settings
            .aliases
            .insert("gs".to_string(), "git status".to_string());
        let via_alias = dispatch("/gs", &mut ctx).unwrap();
        let direct = dispatch("/git status", &mut ctx).unwrap();
        assert_eq!(via_alias, direct);
    }

    #[test]
    fn aliases_do_not_expand_recursively() {
        let (mut ctx, _dir, _calls) = test_ctx();
        ctx.settings
            .aliases
            .insert("a".to_string(), "b".to_string());
        ctx.settings
            .aliases
            .insert("b".to_string(), "clear".to_string());
        // Single-level expansion: `a` becomes `b`, which is not a command.
        assert_eq!(dispatch("/a", &mut ctx).unwrap(), Outcome::Unhandled);
    }

    #[test]
    fn quoted_arguments_stay_together() {
        let (mut ctx, _dir, _calls) = test_ctx();
        // `role` takes the rest of the line as one persona string.
        assert_eq!(
            dispatch("/role \"terse reviewer\"", &mut ctx).unwrap(),
            Outcome::Handled
        );
        assert_eq!(ctx.settings.role, "terse reviewer");
    }
}
