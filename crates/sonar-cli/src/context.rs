//! Per-turn context assembly: file discovery, the permission gate, and the
//! system-prompt bundle handed to the chat client.

use crate::session::SessionContext;
use crate::util::{prompt_line, truncate_chars};
use anyhow::Result;
use sonar_context::{discover_relevant_files, parse_selection, trace_imports};
use sonar_core::safe_path;
use sonar_ui::theme;
use std::fs;

pub struct AssembledContext {
    pub files: Vec<String>,
    pub bundle: String,
}

/// Decide which files accompany `query`, gate them behind the permission
/// prompt, and concatenate the survivors into one bundle string. A denied
/// or empty selection proceeds with zero files rather than aborting.
pub fn assemble_context(query: &str, ctx: &mut SessionContext) -> Result<AssembledContext> {
    let discovered = discover_relevant_files(query, &ctx.settings, &ctx.root);
    if discovered.is_empty() {
        ctx.observer.verbose_log("context: no relevant files");
        return Ok(AssembledContext {
            files: Vec::new(),
            bundle: String::new(),
        });
    }

    let allowed = if ctx.settings.ask_permission && !ctx.auto_run {
        request_file_permission(&discovered)?
    } else {
        println!(
            "{}",
            theme::dim(&format!("Reading {} file(s)...", discovered.len()))
        );
        discovered
    };

    if allowed.is_empty() {
        println!(
            "{} No files read. Using general knowledge...",
            theme::warn_mark()
        );
        return Ok(AssembledContext {
            files: Vec::new(),
            bundle: String::new(),
        });
    }

    let mut bundle = String::new();
    let mut read_files = Vec::new();
    for rel in &allowed {
        let full = safe_path(&ctx.root, rel)?;
        match fs::read_to_string(&full) {
            Ok(content) => {
                if ctx.settings.show_file_preview {
                    println!(
                        "  📄 {} {}",
                        theme::cyan(rel),
                        theme::dim(&format!("({} lines)", content.lines().count()))
                    );
                }
                bundle.push_str(&format!("\n\n=== {rel} ===\n{content}\n"));
                read_files.push(rel.clone());
            }
            Err(_) => {
                println!("  {} {} (unreadable)", theme::err_mark(), theme::cyan(rel));
            }
        }
    }

    // Optional deep analysis: one level of relative imports as previews.
    if ctx.settings.deep_analysis && !read_files.is_empty() {
        let traced = trace_imports(&read_files, &ctx.root);
        if !traced.is_empty() {
            println!(
                "{}",
                theme::dim(&format!("  + traced {} dependency file(s)", traced.len()))
            );
            for t in traced {
                bundle.push_str(&format!("\n\n=== [traced] {} ===\n{}\n", t.path, t.preview));
            }
        }
    }

    Ok(AssembledContext {
        files: read_files,
        bundle,
    })
}

/// allow-all / deny-all / numbered subset (ranges like `1-3` supported).
fn request_file_permission(files: &[String]) -> Result<Vec<String>> {
    println!("\n{}", theme::bold(&theme::yellow("🔐 Permission request")));
    println!("{}", theme::dim("The assistant wants to read these files:"));
    for (i, file) in files.iter().enumerate() {
        println!("  {}. {}", theme::gray(&format!("{}", i + 1)), theme::cyan(file));
    }
    let answer = prompt_line(&format!("{} (y/n/select): ", theme::yellow("Allow?")))?
        .trim()
        .to_lowercase();

    if answer == "y" || answer == "yes" {
        return Ok(files.to_vec());
    }
    if answer == "s" || answer == "select" {
        println!("{}", theme::dim("Enter numbers (e.g. \"1 3\" or \"1-3\"):"));
        let selection = prompt_line("Selection: ")?;
        let picked = parse_selection(&selection, files.len())
            .into_iter()
            .map(|i| files[i - 1].clone())
            .collect();
        return Ok(picked);
    }
    Ok(Vec::new())
}

/// System prompt combining the file bundle, the project brain, and the
/// configured persona.
pub fn build_system_prompt(ctx: &SessionContext, bundle: &str) -> String {
    let mut prompt = String::new();
    if bundle.is_empty() {
        prompt.push_str("You are a helpful AI development assistant. Provide clear, concise answers.");
    } else {
        prompt.push_str(
            "You are a helpful AI development assistant. Relevant project files follow; \
             base answers on the actual code.",
        );
        prompt.push_str(bundle);
    }
    if ctx.brain.is_populated() {
        if let Ok(brain_json) = serde_json::to_string_pretty(&ctx.brain) {
            prompt.push_str("\n\n=== PROJECT BRAIN ===\n");
            prompt.push_str(&brain_json);
        }
    }
    if !ctx.settings.role.is_empty() {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: adopt the persona of: {}",
            truncate_chars(&ctx.settings.role, 200)
        ));
    }
    prompt
}
