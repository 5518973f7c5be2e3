//! Markdown-to-ANSI rendering for assistant responses, a minimal diff
//! preview for the edit flow, and the startup banner.

use crate::theme;
use std::collections::HashSet;
use unicode_width::UnicodeWidthStr;

/// Render assistant markdown line by line: headings, bullets, fenced code
/// blocks, bold and inline code spans.
pub fn render_markdown(text: &str) -> String {
    let mut out = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            if in_code_block {
                out.push_str(&theme::dim("└──────"));
            } else {
                let lang = line.trim_start().trim_start_matches('`').trim();
                let label = if lang.is_empty() { "code" } else { lang };
                out.push_str(&theme::dim(&format!("┌─ {label} ─")));
            }
            in_code_block = !in_code_block;
            out.push('\n');
            continue;
        }
        if in_code_block {
            out.push_str(&theme::gray(line));
            out.push('\n');
            continue;
        }

        let rendered = if let Some(rest) = line.strip_prefix("### ") {
            theme::bold(&theme::magenta(&format!("▸ {rest}")))
        } else if let Some(rest) = line.strip_prefix("## ") {
            theme::bold(&theme::cyan(&format!("▸▸ {rest}")))
        } else if let Some(rest) = line.strip_prefix("# ") {
            theme::bold(&theme::teal(&format!("▸▸▸ {rest}")))
        } else if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            format!("  {} {}", theme::cyan("•"), render_inline(rest))
        } else {
            render_inline(line)
        };
        out.push_str(&rendered);
        out.push('\n');
    }
    out
}

/// Bold (`**…**`) and inline code (`` `…` ``) spans.
fn render_inline(line: &str) -> String {
    let mut out = String::new();
    let mut rest = line;
    loop {
        if let Some(start) = rest.find("**") {
            if let Some(end) = rest[start + 2..].find("**") {
                out.push_str(&render_code_spans(&rest[..start]));
                out.push_str(&theme::bold(&rest[start + 2..start + 2 + end]));
                rest = &rest[start + 4 + end..];
                continue;
            }
        }
        out.push_str(&render_code_spans(rest));
        return out;
    }
}

fn render_code_spans(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    loop {
        if let Some(start) = rest.find('`') {
            if let Some(end) = rest[start + 1..].find('`') {
                out.push_str(&rest[..start]);
                out.push_str(&theme::yellow(&rest[start + 1..start + 1 + end]));
                rest = &rest[start + 2 + end..];
                continue;
            }
        }
        out.push_str(rest);
        return out;
    }
}

/// Minimal ± preview of a proposed edit: removed lines in red, added lines
/// in green, unchanged lines counted instead of echoed.
pub fn render_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let old_set: HashSet<&str> = old_lines.iter().copied().collect();
    let new_set: HashSet<&str> = new_lines.iter().copied().collect();

    let mut out = String::new();
    let mut unchanged = 0usize;
    for line in &old_lines {
        if !new_set.contains(line) {
            out.push_str(&theme::red(&format!("- {line}")));
            out.push('\n');
        } else {
            unchanged += 1;
        }
    }
    for line in &new_lines {
        if !old_set.contains(line) {
            out.push_str(&theme::green(&format!("+ {line}")));
            out.push('\n');
        }
    }
    if out.is_empty() {
        out.push_str(&theme::dim("(no textual changes)"));
        out.push('\n');
    } else if unchanged > 0 {
        out.push_str(&theme::dim(&format!("  {unchanged} unchanged line(s)")));
        out.push('\n');
    }
    out
}

/// Boxed startup banner.
pub fn banner(project: &str, model: &str) -> String {
    let title = "Sonar CLI Agent";
    let subtitle = format!("AI development assistant for {project}");
    let model_line = format!("model: {model}");
    let inner = [title, subtitle.as_str(), model_line.as_str()]
        .iter()
        .map(|s| UnicodeWidthStr::width(*s))
        .max()
        .unwrap_or(0)
        + 2;

    let pad = |s: &str| {
        let fill = inner.saturating_sub(UnicodeWidthStr::width(s) + 1);
        format!(" {s}{}", " ".repeat(fill))
    };
    let top = format!("╭{}╮", "─".repeat(inner));
    let bottom = format!("╰{}╯", "─".repeat(inner));
    format!(
        "{}\n{}\n{}\n{}\n{}\n",
        theme::teal(&top),
        format!(
            "{}{}{}",
            theme::teal("│"),
            theme::bold(&pad(title)),
            theme::teal("│")
        ),
        format!(
            "{}{}{}",
            theme::teal("│"),
            theme::dim(&pad(&subtitle)),
            theme::teal("│")
        ),
        format!(
            "{}{}{}",
            theme::teal("│"),
            theme::dim(&pad(&model_line)),
            theme::teal("│")
        ),
        theme::teal(&bottom),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_bullets_render() {
        let rendered = render_markdown("# Title\n- item one\nplain");
        assert!(rendered.contains("▸▸▸ Title"));
        assert!(rendered.contains("• item one"));
        assert!(rendered.contains("plain"));
    }

    #[test]
    fn code_fences_toggle() {
        let rendered = render_markdown("```rust\nlet x = 1;\n```\nafter");
        assert!(rendered.contains("rust"));
        assert!(rendered.contains("let x = 1;"));
        assert!(rendered.contains("after"));
    }

    #[test]
    fn inline_spans_survive_unbalanced_markers() {
        let rendered = render_markdown("a **bold** and `code` and ** stray");
        assert!(rendered.contains("bold"));
        assert!(rendered.contains("code"));
        assert!(rendered.contains("stray"));
    }

    #[test]
    fn diff_marks_added_and_removed_lines() {
        let diff = render_diff("a\nb\nc", "a\nc\nd");
        assert!(diff.contains("- b"));
        assert!(diff.contains("+ d"));
        assert!(diff.contains("2 unchanged"));
    }

    #[test]
    fn identical_inputs_produce_no_change_note() {
        let diff = render_diff("same\n", "same\n");
        assert!(diff.contains("no textual changes"));
    }

    #[test]
    fn banner_contains_project_and_model() {
        let text = banner("demo", "sonar-pro");
        assert!(text.contains("demo"));
        assert!(text.contains("sonar-pro"));
        assert!(text.contains("╭"));
        assert!(text.contains("╯"));
    }
}
