//! AI-assisted development tools: edit, review, test, document, refactor,
//! metrics, scaffold, commit.

use crate::commands::{chat::suggest_next, usage_error};
use crate::session::SessionContext;
use crate::util::{confirm, git_diff, is_git_repo, truncate_chars};
use anyhow::Result;
use sonar_core::{ChatRequest, ConversationTurn, SonarError, safe_path};
use sonar_context::{ProjectType, project_type};
use sonar_ui::{Spinner, render_diff, render_markdown, theme};
use std::fs;
use std::path::PathBuf;

/// One-shot completion outside the conversation buffer: a system prompt
/// plus a single user message.
fn complete_simple(
    ctx: &mut SessionContext,
    label: &str,
    system: &str,
    user: String,
    temperature: f64,
) -> Result<String> {
    let spinner = Spinner::start(label);
    let result = ctx.client.complete(&ChatRequest {
        model: ctx.settings.model.clone(),
        temperature,
        turns: vec![
            ConversationTurn::system(system),
            ConversationTurn::user(user),
        ],
    });
    spinner.finish();
    let reply = result?;
    ctx.usage.record(&reply.usage);
    Ok(reply.text)
}

fn read_project_file(ctx: &SessionContext, rel: &str) -> Result<(PathBuf, String)> {
    let full = safe_path(&ctx.root, rel)?;
    let content = fs::read_to_string(&full).map_err(|_| SonarError::NotFound {
        what: "file",
        name: rel.to_string(),
    })?;
    Ok((full, content))
}

fn save_allowed(ctx: &SessionContext, question: &str) -> Result<bool> {
    if ctx.auto_run {
        return Ok(true);
    }
    confirm(question)
}

pub fn edit(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.len() < 2 {
        return Err(usage_error("/edit <file> <instruction>"));
    }
    let rel = args[0].clone();
    let instruction = args[1..].join(" ");
    let (full, original) = read_project_file(ctx, &rel)?;

    let system =
        "You are a code editor. Return ONLY the updated file content, no markdown fences or explanations.";
    let user = format!("File: {rel}\nInstruction: {instruction}\n\nCurrent:\n{original}");
    let updated = complete_simple(ctx, "Editing", system, user, ctx.settings.edit_temp)?;

    println!("{}", theme::bold(&theme::yellow("━━ Proposed changes ━━")));
    print!("{}", render_diff(&original, &updated));
    if save_allowed(ctx, "Save?")? {
        let backup = ctx.store.backup_then_write(&full, &updated)?;
        println!("{} Saved {}", theme::ok_mark(), theme::cyan(&rel));
        if let Some(backup) = backup {
            println!(
                "{}",
                theme::dim(&format!("previous version backed up to {}", backup.display()))
            );
        }
        suggest_next("edit", ctx);
    } else {
        println!("{}", theme::gray("Not saved"));
    }
    Ok(())
}

pub fn review(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/review <file>"));
    }
    let rel = args.join(" ");
    let (_, content) = read_project_file(ctx, &rel)?;
    let system = "You are a senior code reviewer. Analyze for bugs, performance issues, \
                  security vulnerabilities and best practices. Provide a structured review.";
    let text = complete_simple(
        ctx,
        "Reviewing code",
        system,
        format!("Review:\n\nFile: {rel}\n\n{content}"),
        ctx.settings.temperature,
    )?;
    println!(
        "{}",
        theme::bold(&theme::magenta(&format!("🔍 Code review: {rel}")))
    );
    println!("{}", render_markdown(&text));
    suggest_next("review", ctx);
    Ok(())
}

fn test_framework(kind: ProjectType) -> &'static str {
    match kind {
        ProjectType::Python => "pytest",
        ProjectType::Android | ProjectType::Gradle | ProjectType::JavaMaven => "JUnit",
        ProjectType::Rust => "Rust #[test] functions",
        ProjectType::Go => "Go testing package tests",
        _ => "Jest",
    }
}

pub fn test_gen(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/test <file>"));
    }
    let rel = args.join(" ");
    let (_, content) = read_project_file(ctx, &rel)?;
    let framework = test_framework(project_type(&ctx.root));
    let system = format!(
        "Generate comprehensive unit tests using {framework}. Include setup, positive and \
         negative cases, and edge cases. Return ONLY test code."
    );
    let text = complete_simple(
        ctx,
        "Generating tests",
        &system,
        format!("Generate tests:\n\n{content}"),
        0.2,
    )?;
    println!("{}", theme::bold(&theme::cyan("🧪 Generated tests")));
    println!("{}", render_markdown(&text));

    let test_rel = test_file_name(&rel);
    if save_allowed(ctx, &format!("Save to {test_rel}?"))? {
        let full = safe_path(&ctx.root, &test_rel)?;
        ctx.store.backup_then_write(&full, &text)?;
        println!("{} Saved {}", theme::ok_mark(), theme::cyan(&test_rel));
    }
    Ok(())
}

/// `src/foo.rs` → `src/foo.test.rs`; extensionless names get `.test`.
fn test_file_name(rel: &str) -> String {
    match rel.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.test.{ext}"),
        _ => format!("{rel}.test"),
    }
}

pub fn document(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/document <file>"));
    }
    let rel = args.join(" ");
    let (full, content) = read_project_file(ctx, &rel)?;
    let system = "Generate comprehensive documentation: overview, functions, parameters, \
                  usage examples, return values. Return ONLY the documented code.";
    let text = complete_simple(
        ctx,
        "Generating docs",
        system,
        format!("Document:\n\n{content}"),
        0.3,
    )?;
    println!("{}", theme::bold(&theme::cyan("📝 Documented code")));
    println!("{}", render_markdown(&text));
    if save_allowed(ctx, "Save?")? {
        ctx.store.backup_then_write(&full, &text)?;
        println!("{} Saved {}", theme::ok_mark(), theme::cyan(&rel));
    }
    Ok(())
}

pub fn refactor(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/refactor <file>"));
    }
    let rel = args.join(" ");
    let (full, original) = read_project_file(ctx, &rel)?;
    let system = "Refactor this code: improve structure, performance and readability. \
                  Return ONLY the refactored code.";
    let text = complete_simple(
        ctx,
        "Refactoring",
        system,
        format!("Refactor:\n\n{original}"),
        0.2,
    )?;
    println!("{}", theme::bold(&theme::yellow("♻ Refactored code")));
    println!("{}", render_markdown(&truncate_chars(&text, 500)));
    if save_allowed(ctx, "Save?")? {
        ctx.store.backup_then_write(&full, &text)?;
        println!("{} Saved {}", theme::ok_mark(), theme::cyan(&rel));
    }
    Ok(())
}

pub fn metrics(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/metrics <file>"));
    }
    let rel = args.join(" ");
    let (_, content) = read_project_file(ctx, &rel)?;
    let counts = count_lines(&content);
    println!(
        "{}",
        theme::bold(&theme::cyan(&format!("📊 Code metrics: {rel}")))
    );
    println!("{} {}", theme::dim("total lines:"), counts.total);
    println!("{} {}", theme::dim("code lines: "), counts.code);
    println!("{} {}", theme::dim("comments:   "), counts.comments);
    println!("{} {}", theme::dim("blank lines:"), counts.blank);
    Ok(())
}

struct LineCounts {
    total: usize,
    code: usize,
    comments: usize,
    blank: usize,
}

fn count_lines(content: &str) -> LineCounts {
    let mut counts = LineCounts {
        total: 0,
        code: 0,
        comments: 0,
        blank: 0,
    };
    for line in content.lines() {
        counts.total += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            counts.blank += 1;
        } else if trimmed.starts_with("//") || trimmed.starts_with('#') {
            counts.comments += 1;
        } else {
            counts.code += 1;
        }
    }
    counts
}

pub fn scaffold(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.len() < 2 {
        return Err(usage_error("/scaffold <type> <name>"));
    }
    let kind = args[0].as_str();
    let name = args[1].as_str();
    let project = project_type(&ctx.root);

    let (filename, content) = match (project, kind) {
        (ProjectType::Android, "activity") => (
            format!("{name}Activity.kt"),
            format!(
                "package com.example.app\n\nimport android.os.Bundle\nimport androidx.appcompat.app.AppCompatActivity\n\nclass {name}Activity : AppCompatActivity() {{\n    override fun onCreate(savedInstanceState: Bundle?) {{\n        super.onCreate(savedInstanceState)\n    }}\n}}\n"
            ),
        ),
        (ProjectType::Javascript, "component") => (
            format!("{name}.jsx"),
            format!(
                "import React from 'react';\n\nconst {name} = () => {{\n  return (\n    <div>\n      <h1>{name}</h1>\n    </div>\n  );\n}};\n\nexport default {name};\n"
            ),
        ),
        _ => {
            let system = format!(
                "Generate a {kind} template named {name} for a {} project. Return ONLY code.",
                project.label()
            );
            let text = complete_simple(
                ctx,
                "Generating",
                &system,
                format!("Create {kind}: {name}"),
                ctx.settings.temperature,
            )?;
            let ext = match project {
                ProjectType::Python => "py",
                ProjectType::Rust => "rs",
                ProjectType::Go => "go",
                ProjectType::JavaMaven => "java",
                _ => "js",
            };
            (format!("{name}.{ext}"), text)
        }
    };

    println!("{}", theme::bold(&theme::yellow(&format!("━━ {filename} ━━"))));
    println!("{content}");
    if save_allowed(ctx, &format!("Save as {filename}?"))? {
        let full = safe_path(&ctx.root, &filename)?;
        ctx.store.backup_then_write(&full, &content)?;
        println!("{} Created {}", theme::ok_mark(), theme::cyan(&filename));
    }
    Ok(())
}

const COMMIT_DIFF_LIMIT: usize = 3000;

pub fn commit(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if !ctx.settings.git_integration {
        println!("{} Git integration is disabled in settings", theme::warn_mark());
        return Ok(());
    }
    if !is_git_repo(&ctx.root) {
        println!("{} Not a git repository", theme::err_mark());
        return Ok(());
    }
    let diff = git_diff(&ctx.root)?;
    if diff.trim().is_empty() {
        println!("{} No changes to commit", theme::warn_mark());
        return Ok(());
    }
    let system = "Generate a concise conventional commit message. Format: \
                  <type>(<scope>): <description>. Types: feat, fix, docs, style, refactor, \
                  test, chore. Keep under 72 chars.";
    let text = complete_simple(
        ctx,
        "Generating commit",
        system,
        format!(
            "Generate commit message:\n\n{}",
            truncate_chars(&diff, COMMIT_DIFF_LIMIT)
        ),
        0.3,
    )?;
    println!("{}", theme::bold(&theme::cyan("📝 Suggested commit:")));
    println!("{}", theme::green(text.trim()));
    Ok(())
}
