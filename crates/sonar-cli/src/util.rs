use anyhow::{Result, anyhow};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;

/// Run a child process in `cwd` and capture combined output, failing on a
/// non-zero exit status.
pub fn run_process(cwd: &Path, program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).current_dir(cwd).args(args).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(anyhow!(
            "{program} {args:?} failed with status {}: {stdout}{stderr}",
            output.status
        ));
    }
    Ok(format!("{stdout}{stderr}").trim_end().to_string())
}

// ── Git helpers ─────────────────────────────────────────────────────────

pub fn is_git_repo(cwd: &Path) -> bool {
    run_process(cwd, "git", &["rev-parse", "--git-dir"]).is_ok()
}

pub fn git_status(cwd: &Path) -> Result<String> {
    run_process(cwd, "git", &["status", "--short"])
}

pub fn git_diff(cwd: &Path) -> Result<String> {
    run_process(cwd, "git", &["diff"])
}

pub fn git_log(cwd: &Path, count: usize) -> Result<String> {
    run_process(
        cwd,
        "git",
        &[
            "log",
            &format!("-{count}"),
            "--pretty=format:%h - %s (%cr) <%an>",
        ],
    )
}

// ── Interactive helpers ─────────────────────────────────────────────────

/// y/n question on stdin. EOF counts as "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Read one line of free-form input.
pub fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Paste-style multiline input terminated by a `::end` line.
pub fn read_multiline() -> Result<String> {
    println!("Paste content. End with ::end");
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim() == "::end" {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Truncate to at most `max_chars`, appending an ellipsis when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
