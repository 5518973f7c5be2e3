//! The project brain: a persisted summary document (description,
//! architecture, conventions) folded into every chat context.

use crate::commands::usage_error;
use crate::session::SessionContext;
use anyhow::Result;
use sonar_core::{ChatRequest, ConversationTurn, ProjectBrain};
use sonar_context::collect_project_files;
use sonar_ui::{Spinner, theme};
use std::fs;

pub fn brain(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("init") => init(ctx),
        Some("show") => {
            show(&ctx.brain);
            Ok(())
        }
        Some("update") => update(ctx),
        _ => Err(usage_error("/brain init|show|update")),
    }
}

fn init(ctx: &mut SessionContext) -> Result<()> {
    let mut fresh = ProjectBrain {
        name: ctx
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
        ..ProjectBrain::default()
    };
    fresh.important_files = collect_project_files(&ctx.root, 2)
        .into_iter()
        .take(10)
        .collect();
    ctx.store.save_brain(&mut fresh)?;
    ctx.brain = fresh;
    println!(
        "{} Brain initialized. Edit .sonar/brain.json to add detail, or run /brain update.",
        theme::ok_mark()
    );
    Ok(())
}

fn show(brain: &ProjectBrain) {
    println!("{}", theme::bold(&theme::magenta("🧠 Project brain")));
    match serde_json::to_string_pretty(brain) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{brain:?}"),
    }
}

/// Ask the model to summarize the project from its file list and manifest,
/// then merge the structured answer into the stored brain.
fn update(ctx: &mut SessionContext) -> Result<()> {
    let files = collect_project_files(&ctx.root, 2);
    let manifest = ["package.json", "Cargo.toml", "pyproject.toml", "go.mod"]
        .iter()
        .find_map(|name| fs::read_to_string(ctx.root.join(name)).ok())
        .unwrap_or_default();

    let system = "Analyze this project structure and manifest. Return a JSON object with \
                  keys: description, architecture, conventions.";
    let user = format!("Manifest:\n{manifest}\n\nFiles:\n{}", files.join("\n"));

    let spinner = Spinner::start("Updating brain");
    let result = ctx.client.complete(&ChatRequest {
        model: ctx.settings.model.clone(),
        temperature: ctx.settings.temperature,
        turns: vec![
            ConversationTurn::system(system),
            ConversationTurn::user(user),
        ],
    });
    spinner.finish();
    let reply = result?;
    ctx.usage.record(&reply.usage);

    if let Some(analysis) = extract_json_object(&reply.text) {
        if let Some(description) = analysis.get("description").and_then(|v| v.as_str()) {
            ctx.brain.description = description.to_string();
        }
        if let Some(architecture) = analysis.get("architecture").and_then(|v| v.as_str()) {
            ctx.brain.architecture = architecture.to_string();
        }
        if let Some(conventions) = analysis.get("conventions").and_then(|v| v.as_str()) {
            ctx.brain.conventions = conventions.to_string();
        }
    } else {
        println!("{} Could not parse the analysis; keeping prior brain", theme::warn_mark());
    }
    ctx.brain.important_files = files.into_iter().take(10).collect();

    let mut brain = ctx.brain.clone();
    ctx.store.save_brain(&mut brain)?;
    ctx.brain = brain;
    println!("{} Brain updated", theme::ok_mark());
    Ok(())
}

/// First `{...}` block in the reply, parsed as JSON.
fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    serde_json::from_str(text.get(start..=end)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::test_ctx;

    #[test]
    fn init_names_brain_after_root_and_persists() {
        let (mut ctx, dir, _calls) = test_ctx();
        brain(&["init".to_string()], &mut ctx).unwrap();
        let expected = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(ctx.brain.name, expected);
        assert!(ctx.brain.last_updated.is_some());
    }

    #[test]
    fn extract_json_object_tolerates_prose() {
        let value =
            extract_json_object("Sure! Here you go:\n{\"description\": \"a CLI\"}\nDone.").unwrap();
        assert_eq!(value["description"], "a CLI");
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn update_merges_structured_reply() {
        let (mut ctx, _dir, calls) = test_ctx();
        // Swap in a stub that answers with a structured analysis.
        ctx.client = Box::new(crate::testkit::StubClient {
            calls: std::sync::Arc::clone(&calls),
            reply: "{\"description\": \"demo\", \"architecture\": \"flat\", \
                    \"conventions\": \"snake_case\"}"
                .to_string(),
        });
        brain(&["update".to_string()], &mut ctx).unwrap();
        assert_eq!(ctx.brain.description, "demo");
        assert_eq!(ctx.brain.architecture, "flat");
        assert!(ctx.brain.is_populated());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
