//! File commands: read, write, mkdir, rm, cp, mv, restore.

use crate::commands::{chat::suggest_next, usage_error};
use crate::session::SessionContext;
use crate::util::{confirm, format_size, read_multiline};
use anyhow::Result;
use sonar_core::{SonarError, safe_path};
use sonar_ui::theme;
use std::fs;
use std::path::Path;

fn existing_file(ctx: &SessionContext, rel: &str) -> Result<std::path::PathBuf> {
    let full = safe_path(&ctx.root, rel)?;
    if !full.is_file() {
        return Err(SonarError::NotFound {
            what: "file",
            name: rel.to_string(),
        }
        .into());
    }
    Ok(full)
}

pub fn read(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/read <file>"));
    }
    let rel = args.join(" ");
    let full = existing_file(ctx, &rel)?;
    let content = fs::read_to_string(&full)?;
    let size = fs::metadata(&full).map(|m| m.len()).unwrap_or(0);

    println!(
        "{} {}",
        theme::bold(&theme::cyan(&format!("📄 {rel}"))),
        theme::dim(&format!(
            "· {} lines · {}",
            content.lines().count(),
            format_size(size)
        ))
    );
    for (i, line) in content.lines().enumerate() {
        println!("{} {line}", theme::gray(&format!("{:>4}", i + 1)));
    }
    suggest_next("read", ctx);
    Ok(())
}

pub fn write(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/write <file>"));
    }
    let rel = args.join(" ");
    let full = safe_path(&ctx.root, &rel)?;
    let content = read_multiline()?;
    let backup = ctx.store.backup_then_write(&full, &content)?;
    println!("{} Written to {}", theme::ok_mark(), theme::cyan(&rel));
    if let Some(backup) = backup {
        println!(
            "{}",
            theme::dim(&format!("previous version backed up to {}", backup.display()))
        );
    }
    Ok(())
}

pub fn mkdir(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/mkdir <dir>"));
    }
    let rel = args.join(" ");
    let full = safe_path(&ctx.root, &rel)?;
    fs::create_dir_all(&full)?;
    println!("{} Created {}", theme::ok_mark(), theme::cyan(&rel));
    Ok(())
}

/// Deletes always confirm interactively, even with auto-run on.
pub fn rm(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/rm <path>"));
    }
    let rel = args.join(" ");
    let full = safe_path(&ctx.root, &rel)?;
    if !full.exists() {
        return Err(SonarError::NotFound {
            what: "path",
            name: rel,
        }
        .into());
    }
    if !confirm(&format!("{} Delete {rel}?", theme::warn_mark()))? {
        println!("{}", theme::gray("Cancelled"));
        return Ok(());
    }
    if full.is_dir() {
        fs::remove_dir_all(&full)?;
    } else {
        fs::remove_file(&full)?;
    }
    println!("{} Deleted {}", theme::ok_mark(), theme::cyan(&rel));
    Ok(())
}

pub fn cp(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.len() < 2 {
        return Err(usage_error("/cp <src> <dest>"));
    }
    let src = safe_path(&ctx.root, &args[0])?;
    let dest = safe_path(&ctx.root, &args[1..].join(" "))?;
    if src.is_dir() {
        copy_dir(&src, &dest)?;
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&src, &dest)?;
    }
    println!(
        "{} Copied {} → {}",
        theme::ok_mark(),
        theme::cyan(&args[0]),
        theme::cyan(&args[1..].join(" "))
    );
    Ok(())
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

pub fn mv(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.len() < 2 {
        return Err(usage_error("/mv <src> <dest>"));
    }
    let src = safe_path(&ctx.root, &args[0])?;
    let dest = safe_path(&ctx.root, &args[1..].join(" "))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&src, &dest)?;
    println!(
        "{} Moved {} → {}",
        theme::ok_mark(),
        theme::cyan(&args[0]),
        theme::cyan(&args[1..].join(" "))
    );
    Ok(())
}

/// Put the most recent backup of a file back in place. The clobbered
/// current version is itself backed up first.
pub fn restore(args: &[String], ctx: &mut SessionContext) -> Result<()> {
    if args.is_empty() {
        return Err(usage_error("/restore <file>"));
    }
    let rel = args.join(" ");
    let full = safe_path(&ctx.root, &rel)?;
    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = ctx.store.latest_backup(&name)?;
    let content = fs::read_to_string(&backup)?;
    ctx.store.backup_then_write(&full, &content)?;
    println!(
        "{} Restored {} from {}",
        theme::ok_mark(),
        theme::cyan(&rel),
        theme::dim(&backup.display().to_string())
    );
    Ok(())
}
