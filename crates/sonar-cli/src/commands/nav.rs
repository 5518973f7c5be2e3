//! Navigation and project-inspection commands.

use crate::commands::usage_error;
use crate::session::SessionContext;
use crate::util::format_size;
use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use sonar_core::{SonarError, safe_path};
use sonar_ui::theme;
use std::fs;
use std::path::Path;

pub fn ls(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let rel = if args.is_empty() {
        ".".to_string()
    } else {
        args.join(" ")
    };
    let dir = safe_path(&ctx.root, &rel)?;
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(name);
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push((name, size));
        }
    }
    if dirs.is_empty() && files.is_empty() {
        println!("{}", theme::gray("(empty directory)"));
        return Ok(());
    }
    dirs.sort();
    files.sort();
    println!(
        "{} {}",
        theme::bold(&theme::cyan(&format!(
            "📁 {}",
            dir.file_name().map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| rel.clone())
        ))),
        theme::dim(&format!("· {} items", dirs.len() + files.len()))
    );
    for name in &dirs {
        println!("  📂 {}", theme::teal(&format!("{name}/")));
    }
    for (name, size) in &files {
        println!("  📄 {name} {}", theme::dim(&format_size(*size)));
    }
    Ok(())
}

pub fn cd(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/cd <dir>"));
    }
    let target = safe_path(&ctx.root, &args.join(" "))?;
    if !target.is_dir() {
        return Err(SonarError::NotFound {
            what: "directory",
            name: args.join(" "),
        }
        .into());
    }
    ctx.root = target;
    println!(
        "{} Changed to {}",
        theme::ok_mark(),
        theme::cyan(&ctx.root.display().to_string())
    );
    Ok(())
}

pub fn root(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    println!("📍 {}", theme::yellow(&ctx.root.display().to_string()));
    Ok(())
}

const TREE_MAX_DEPTH: usize = 3;

pub fn tree(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let rel = if args.is_empty() {
        ".".to_string()
    } else {
        args.join(" ")
    };
    let dir = safe_path(&ctx.root, &rel)?;
    println!(
        "{}",
        theme::bold(&theme::cyan(&format!(
            "🌳 {}",
            dir.file_name().map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| rel.clone())
        )))
    );
    print_tree(&dir, 0)?;
    Ok(())
}

fn print_tree(dir: &Path, depth: usize) -> Result<()> {
    if depth > TREE_MAX_DEPTH {
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let prefix = "  ".repeat(depth);
        if entry.file_type()?.is_dir() {
            println!("{prefix}├─ 📂 {}", theme::teal(&format!("{name}/")));
            print_tree(&entry.path(), depth + 1)?;
        } else {
            println!("{prefix}├─ 📄 {name}");
        }
    }
    Ok(())
}

const FIND_MAX_DEPTH: usize = 6;

pub fn find(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let Some(pattern) = args.first() else {
        return Err(usage_error("/find <pattern> [dir]"));
    };
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|_| usage_error("/find <pattern> — pattern must be a valid regex"))?;
    let rel = args.get(1).cloned().unwrap_or_else(|| ".".to_string());
    let dir = safe_path(&ctx.root, &rel)?;

    let mut matches = Vec::new();
    collect_matches(&dir, &ctx.root, &regex, 0, &mut matches)?;
    if matches.is_empty() {
        println!("{} No matches for \"{pattern}\"", theme::warn_mark());
        return Ok(());
    }
    println!(
        "{} Found {} match(es):",
        theme::ok_mark(),
        theme::yellow(&matches.len().to_string())
    );
    for m in matches {
        println!("  {}", theme::cyan(&m));
    }
    Ok(())
}

fn collect_matches(
    dir: &Path,
    root: &Path,
    regex: &regex::Regex,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<()> {
    if depth > FIND_MAX_DEPTH {
        return Ok(());
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(());
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if regex.is_match(&name) {
            if let Ok(rel) = entry.path().strip_prefix(root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            collect_matches(&entry.path(), root, regex, depth + 1, out)?;
        }
    }
    Ok(())
}

pub fn grep(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/grep <pattern>"));
    }
    let pattern = args.join(" ");
    let matches = sonar_context::grep_project(&ctx.root, &pattern);
    if matches.is_empty() {
        println!("{} No matches found", theme::warn_mark());
        return Ok(());
    }
    println!(
        "{}",
        theme::bold(&theme::green(&format!("🔍 {} match(es)", matches.len())))
    );
    for m in matches.iter().take(50) {
        println!(
            "  {}:{} {}",
            theme::cyan(&m.file),
            theme::yellow(&m.line.to_string()),
            theme::dim(&m.content)
        );
    }
    if matches.len() > 50 {
        println!("{}", theme::dim(&format!("  ...and {} more", matches.len() - 50)));
    }
    Ok(())
}

pub fn stat(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/stat <path>"));
    }
    let rel = args.join(" ");
    let full = safe_path(&ctx.root, &rel)?;
    let meta = fs::metadata(&full).map_err(|_| SonarError::NotFound {
        what: "path",
        name: rel.clone(),
    })?;
    let kind = if meta.is_dir() { "directory" } else { "file" };
    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    println!("{}", theme::bold(&theme::cyan(&format!("📄 {rel}"))));
    println!("{} {kind}", theme::dim("type:"));
    println!(
        "{} {} ({} bytes)",
        theme::dim("size:"),
        format_size(meta.len()),
        meta.len()
    );
    println!("{} {modified}", theme::dim("modified:"));
    Ok(())
}

pub fn todo(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    let todos = sonar_context::scan_todos(&ctx.root);
    if todos.is_empty() {
        println!("{} No TODOs found", theme::ok_mark());
        return Ok(());
    }
    println!("{}", theme::bold(&theme::magenta("📝 Project tasks")));
    for t in todos {
        println!(
            "  {}:{} {}",
            theme::cyan(&t.file),
            theme::yellow(&t.line.to_string()),
            t.content
        );
    }
    Ok(())
}

pub fn deps(_args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if let Ok(raw) = fs::read_to_string(ctx.root.join("package.json")) {
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        println!("{}", theme::bold(&theme::teal("📦 Dependencies")));
        for section in ["dependencies", "devDependencies"] {
            if let Some(map) = value.get(section).and_then(|v| v.as_object()) {
                println!("{}", theme::bold(section));
                for (name, version) in map {
                    println!(
                        "  {}: {}",
                        theme::cyan(name),
                        version.as_str().unwrap_or("?")
                    );
                }
            }
        }
        return Ok(());
    }
    if let Ok(raw) = fs::read_to_string(ctx.root.join("Cargo.toml")) {
        println!("{}", theme::bold(&theme::teal("📦 Dependencies")));
        let mut in_deps = false;
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                in_deps = trimmed.contains("dependencies");
                if in_deps {
                    println!("{}", theme::bold(trimmed));
                }
                continue;
            }
            if in_deps && !trimmed.is_empty() && !trimmed.starts_with('#') {
                println!("  {trimmed}");
            }
        }
        return Ok(());
    }
    println!("{} No package.json or Cargo.toml found", theme::warn_mark());
    Ok(())
}
