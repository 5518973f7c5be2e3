//! Project analysis and per-turn file relevance.
//!
//! The relevant file set is computed fresh for every user turn — relevance
//! depends on the query text, so nothing here is cached across turns.

use ignore::WalkBuilder;
use regex::{Regex, RegexSet};
use sonar_core::{Settings, safe_path};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ── Project typing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Android,
    Gradle,
    Javascript,
    JavaMaven,
    Python,
    Rust,
    Go,
    Unknown,
}

impl ProjectType {
    pub fn label(self) -> &'static str {
        match self {
            ProjectType::Android => "android",
            ProjectType::Gradle => "gradle",
            ProjectType::Javascript => "javascript",
            ProjectType::JavaMaven => "java-maven",
            ProjectType::Python => "python",
            ProjectType::Rust => "rust",
            ProjectType::Go => "go",
            ProjectType::Unknown => "unknown",
        }
    }
}

/// Detect the project type from marker files at the root.
pub fn project_type(root: &Path) -> ProjectType {
    let has = |name: &str| root.join(name).exists();
    if has("build.gradle") || has("build.gradle.kts") {
        return if root.join("app").is_dir() {
            ProjectType::Android
        } else {
            ProjectType::Gradle
        };
    }
    if has("package.json") {
        return ProjectType::Javascript;
    }
    if has("pom.xml") {
        return ProjectType::JavaMaven;
    }
    if has("requirements.txt") || has("pyproject.toml") {
        return ProjectType::Python;
    }
    if has("Cargo.toml") {
        return ProjectType::Rust;
    }
    if has("go.mod") {
        return ProjectType::Go;
    }
    ProjectType::Unknown
}

// ── File collection ─────────────────────────────────────────────────────

const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "build",
    "dist",
    "__pycache__",
    "target",
    "vendor",
];

fn important_file_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)readme|\.md$",
            r"(?i)^(package\.json|build\.gradle(\.kts)?|settings\.gradle|AndroidManifest\.xml|pom\.xml|requirements\.txt|pyproject\.toml|Cargo\.toml|go\.mod)$",
            r"(?i)\.(kt|java|js|mjs|ts|tsx|jsx|py|rs|go)$",
        ])
        .expect("file patterns are valid")
    })
}

/// Collect interesting project files (README, manifests, sources) as
/// root-relative paths, depth-capped and sorted.
pub fn collect_project_files(root: &Path, max_depth: usize) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .max_depth(Some(max_depth + 1))
        .standard_filters(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir()) && SKIP_DIRS.contains(&name.as_ref()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !important_file_patterns().is_match(&name) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    files.sort();
    files
}

// ── Query classification ────────────────────────────────────────────────

fn conversational_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)^(hi|hello|hey|yo|sup|wassup)$",
            r"(?i)^(thanks|thank you|thx|ty)$",
            r"(?i)^(ok|okay|cool|nice|awesome|great)$",
            r"(?i)^(bye|goodbye|see you|later)$",
            r"(?i)^(yes|no|yep|nope|yeah|nah)$",
            r"(?i)^(lol|lmao|haha)$",
            r"(?i)^(oh|hmm|uh|ah|wow)$",
        ])
        .expect("conversational patterns are valid")
    })
}

/// Short greetings, acknowledgements and farewells need no file context.
pub fn is_conversational_query(query: &str) -> bool {
    let trimmed = query.trim();
    if trimmed.chars().count() < 15 && conversational_patterns().is_match(trimmed) {
        return true;
    }
    static ACK: OnceLock<Regex> = OnceLock::new();
    let ack = ACK.get_or_init(|| {
        Regex::new(r"(?i)^(ok|cool|nice|thanks|alright)\s+(bro|man|dude|mate)").unwrap()
    });
    ack.is_match(trimmed)
}

fn needs_code_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)what.*do",
            r"(?i)explain",
            r"(?i)show",
            r"(?i)find",
            r"(?i)search",
            r"(?i)dependenc",
            r"(?i)import",
            r"(?i)function",
            r"(?i)class",
            r"(?i)code",
            r"(?i)file",
            r"(?i)implement",
            r"(?i)how.*work",
            r"(?i)manifest",
            r"(?i)permission",
            r"(?i)gradle",
            r"(?i)build",
        ])
        .expect("needs-code patterns are valid")
    })
}

pub fn needs_code_query(query: &str) -> bool {
    needs_code_patterns().is_match(query)
}

// ── Explicit @mentions ──────────────────────────────────────────────────

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([\w./\-]+)").unwrap())
}

/// `@path` tokens in the query, without the prefix character.
pub fn extract_mentions(query: &str) -> Vec<String> {
    mention_pattern()
        .captures_iter(query)
        .map(|c| c[1].to_string())
        .collect()
}

// ── Relevance pipeline ──────────────────────────────────────────────────

/// Decide which project files are relevant to `query`.
///
/// Rules apply in priority order and the first non-empty result wins:
/// explicit `@` mentions, conversational short-circuit, needs-code gate,
/// then project-type heuristics with an entrypoint fallback. The result is
/// deduplicated, capped at `max_files_per_query`, and root-relative.
pub fn discover_relevant_files(query: &str, settings: &Settings, root: &Path) -> Vec<String> {
    // 1. Explicit @path mentions bypass every heuristic.
    let mut explicit = Vec::new();
    for mention in extract_mentions(query) {
        if let Ok(full) = safe_path(root, &mention) {
            if full.is_file() {
                if let Ok(rel) = full.strip_prefix(root) {
                    explicit.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
    if !explicit.is_empty() {
        return dedup_capped(explicit, settings.max_files_per_query);
    }

    // 2. Conversational queries need no files at all.
    if settings.smart_file_detection && is_conversational_query(query) {
        return Vec::new();
    }

    // 3. Queries with no code trigger need no files either.
    if !needs_code_query(query) {
        return Vec::new();
    }

    // 4. Project-type heuristics plus an entrypoint-like fallback.
    let kind = project_type(root);
    let all_files = collect_project_files(root, 3);
    let query_lower = query.to_lowercase();
    let mut relevant: Vec<String> = Vec::new();

    let mut push_matching = |predicate: &dyn Fn(&str) -> bool, out: &mut Vec<String>| {
        out.extend(all_files.iter().filter(|f| predicate(f)).cloned());
    };

    match kind {
        ProjectType::Android | ProjectType::Gradle => {
            if query_lower.contains("manifest") || query_lower.contains("permission") {
                push_matching(&|f| f.contains("AndroidManifest.xml"), &mut relevant);
            }
            if query_lower.contains("main")
                || query_lower.contains("activity")
                || query_lower.contains("purpose")
            {
                push_matching(&|f| f.contains("MainActivity") || f.contains("Main"), &mut relevant);
            }
            if query_lower.contains("gradle")
                || query_lower.contains("dependenc")
                || query_lower.contains("build")
            {
                push_matching(&|f| f.contains("build.gradle"), &mut relevant);
            }
        }
        ProjectType::Rust => {
            if query_lower.contains("dependenc")
                || query_lower.contains("cargo")
                || query_lower.contains("build")
            {
                push_matching(&|f| f.ends_with("Cargo.toml"), &mut relevant);
            }
            if query_lower.contains("main") || query_lower.contains("entry") {
                push_matching(&|f| f.ends_with("main.rs") || f.ends_with("lib.rs"), &mut relevant);
            }
        }
        ProjectType::Javascript => {
            if query_lower.contains("dependenc") || query_lower.contains("package") {
                push_matching(&|f| f.ends_with("package.json"), &mut relevant);
            }
            if query_lower.contains("main") || query_lower.contains("entry") {
                push_matching(&|f| f.contains("index."), &mut relevant);
            }
        }
        _ => {}
    }

    if query_lower.contains("what") || query_lower.contains("about") || query_lower.contains("do")
    {
        push_matching(&|f| f.to_lowercase().contains("readme"), &mut relevant);
    }

    if relevant.is_empty() && settings.smart_context {
        push_matching(
            &|f| {
                f.contains("Main")
                    || f.contains("index")
                    || f.contains("app")
                    || f.ends_with("main.rs")
                    || f.ends_with("build.gradle")
                    || f.ends_with("Cargo.toml")
                    || f.contains("AndroidManifest")
            },
            &mut relevant,
        );
    }

    dedup_capped(relevant, settings.max_files_per_query)
}

fn dedup_capped(files: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for file in files {
        if seen.insert(file.clone()) {
            out.push(file);
        }
        if out.len() == cap.max(1) {
            break;
        }
    }
    out
}

// ── Import tracing ──────────────────────────────────────────────────────

const PREVIEW_LINES: usize = 50;

#[derive(Debug, Clone)]
pub struct TracedFile {
    pub path: String,
    pub preview: String,
}

fn import_pattern_for(ext: &str) -> Option<&'static Regex> {
    static JS: OnceLock<Regex> = OnceLock::new();
    static PY: OnceLock<Regex> = OnceLock::new();
    static RS: OnceLock<Regex> = OnceLock::new();
    match ext {
        "js" | "mjs" | "ts" | "jsx" | "tsx" => Some(JS.get_or_init(|| {
            Regex::new(r#"import\s+.*?\s+from\s+['"](.*?)['"]"#).unwrap()
        })),
        "py" => Some(PY.get_or_init(|| Regex::new(r"(?m)^\s*from\s+(\.[\w.]*)\s+import").unwrap())),
        "rs" => Some(RS.get_or_init(|| Regex::new(r"(?m)^\s*(?:pub\s+)?mod\s+(\w+)\s*;").unwrap())),
        _ => None,
    }
}

/// Follow one level of relative imports from the selected files and return
/// truncated previews of the targets. Files already in `selected` are never
/// re-included, and each target is traced at most once.
pub fn trace_imports(selected: &[String], root: &Path) -> Vec<TracedFile> {
    let mut traced_paths: BTreeSet<String> = BTreeSet::new();
    let mut results = Vec::new();

    for rel in selected {
        let full = root.join(rel);
        let Ok(content) = fs::read_to_string(&full) else {
            continue;
        };
        let ext = full
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let Some(pattern) = import_pattern_for(&ext) else {
            continue;
        };

        for caps in pattern.captures_iter(&content) {
            let target = &caps[1];
            let Some(resolved) = resolve_import(&full, target, &ext, root) else {
                continue;
            };
            if selected.iter().any(|s| s == &resolved) || !traced_paths.insert(resolved.clone()) {
                continue;
            }
            if let Ok(traced_content) = fs::read_to_string(root.join(&resolved)) {
                results.push(TracedFile {
                    path: resolved,
                    preview: preview_of(&traced_content),
                });
            }
        }
    }

    results
}

/// Resolve a relative import target to a root-relative existing file.
fn resolve_import(source: &Path, target: &str, ext: &str, root: &Path) -> Option<String> {
    let dir = source.parent()?;
    let candidates: Vec<PathBuf> = match ext {
        "js" | "mjs" | "ts" | "jsx" | "tsx" => {
            if !target.starts_with('.') {
                return None; // package imports are not project files
            }
            ["", ".js", ".mjs", ".ts", ".jsx", ".tsx", ".json"]
                .iter()
                .map(|suffix| dir.join(format!("{target}{suffix}")))
                .collect()
        }
        "py" => {
            let module = target.trim_start_matches('.').replace('.', "/");
            if module.is_empty() {
                return None;
            }
            vec![
                dir.join(format!("{module}.py")),
                dir.join(&module).join("__init__.py"),
            ]
        }
        "rs" => vec![
            dir.join(format!("{target}.rs")),
            dir.join(target).join("mod.rs"),
        ],
        _ => return None,
    };

    for candidate in candidates {
        if candidate.is_file() {
            if let Ok(rel) = candidate.strip_prefix(root) {
                // Collecting components normalizes away `.` segments that
                // relative import targets commonly carry.
                let rel: PathBuf = rel.components().collect();
                return Some(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    None
}

fn preview_of(content: &str) -> String {
    let mut lines: Vec<&str> = content.lines().take(PREVIEW_LINES).collect();
    let truncated = content.lines().count() > PREVIEW_LINES;
    if truncated {
        lines.push("... (truncated)");
    }
    lines.join("\n")
}

// ── Numbered selection parsing ──────────────────────────────────────────

/// Parse a permission selection like `"1-3 5"` or `"1,2,4"` into 1-based
/// indices, deduplicated, keeping only values within `1..=len`.
pub fn parse_selection(input: &str, len: usize) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for part in input.split(|c: char| c.is_whitespace() || c == ',') {
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
            else {
                continue;
            };
            for idx in start..=end {
                if (1..=len).contains(&idx) && seen.insert(idx) {
                    out.push(idx);
                }
            }
        } else if let Ok(idx) = part.parse::<usize>() {
            if (1..=len).contains(&idx) && seen.insert(idx) {
                out.push(idx);
            }
        }
    }
    out
}

// ── Project scans (grep / todo / deps) ──────────────────────────────────

#[derive(Debug, Clone)]
pub struct GrepMatch {
    pub file: String,
    pub line: usize,
    pub content: String,
}

/// Case-insensitive substring search across collected project files.
pub fn grep_project(root: &Path, pattern: &str) -> Vec<GrepMatch> {
    let needle = pattern.to_lowercase();
    let mut matches = Vec::new();
    for rel in collect_project_files(root, 4) {
        let Ok(content) = fs::read_to_string(root.join(&rel)) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                matches.push(GrepMatch {
                    file: rel.clone(),
                    line: idx + 1,
                    content: line.trim().to_string(),
                });
            }
        }
    }
    matches
}

/// TODO/FIXME markers across the project.
pub fn scan_todos(root: &Path) -> Vec<GrepMatch> {
    let mut todos = grep_project(root, "TODO");
    todos.extend(grep_project(root, "FIXME"));
    todos.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    todos.dedup_by(|a, b| a.file == b.file && a.line == b.line);
    todos
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn selection_parses_ranges_and_indices() {
        assert_eq!(parse_selection("1-3 5", 6), vec![1, 2, 3, 5]);
        assert_eq!(parse_selection("1,2,4", 6), vec![1, 2, 4]);
        // Out-of-range and duplicate entries are dropped.
        assert_eq!(parse_selection("2 2 9 3-12", 4), vec![2, 3, 4]);
        assert!(parse_selection("nope", 4).is_empty());
    }

    #[test]
    fn conversational_queries_are_detected() {
        assert!(is_conversational_query("hi"));
        assert!(is_conversational_query("thanks"));
        assert!(is_conversational_query("ok bro"));
        assert!(!is_conversational_query("explain the build system"));
        // Long inputs are never conversational even if they start politely.
        assert!(!is_conversational_query(
            "thanks, now explain how the dispatcher works"
        ));
    }

    #[test]
    fn mention_extraction_finds_paths() {
        assert_eq!(
            extract_mentions("look at @src/main.rs and @Cargo.toml please"),
            vec!["src/main.rs", "Cargo.toml"]
        );
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[test]
    fn explicit_mentions_bypass_heuristics() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "README.md", "# demo");

        let settings = Settings::default();
        let files = discover_relevant_files("explain @src/main.rs", &settings, dir.path());
        assert_eq!(files, vec!["src/main.rs"]);
    }

    #[test]
    fn conversational_query_yields_no_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "# demo");
        let settings = Settings::default();
        assert!(discover_relevant_files("hello", &settings, dir.path()).is_empty());
    }

    #[test]
    fn non_code_query_yields_no_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "# demo");
        let settings = Settings::default();
        assert!(
            discover_relevant_files("tell me a joke", &settings, dir.path()).is_empty()
        );
    }

    #[test]
    fn heuristics_cap_at_max_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Cargo.toml", "[package]");
        for i in 0..12 {
            write(dir.path(), &format!("src/app_{i}.rs"), "pub fn f() {}");
        }
        write(dir.path(), "src/main.rs", "fn main() {}");

        let mut settings = Settings::default();
        settings.max_files_per_query = 3;
        let files =
            discover_relevant_files("explain how the app code works", &settings, dir.path());
        assert!(!files.is_empty());
        assert!(files.len() <= 3);
    }

    #[test]
    fn collect_skips_build_dirs_and_sorts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", "");
        write(dir.path(), "target/debug/junk.rs", "");
        write(dir.path(), "README.md", "");

        let files = collect_project_files(dir.path(), 3);
        assert_eq!(files, vec!["README.md", "src/lib.rs"]);
    }

    #[test]
    fn trace_follows_one_level_of_relative_imports() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/index.mjs",
            "import { helper } from \"./util.mjs\";\nhelper();\n",
        );
        write(
            dir.path(),
            "src/util.mjs",
            "import fs from \"node:fs\";\nexport function helper() {}\n",
        );

        let traced = trace_imports(&["src/index.mjs".to_string()], dir.path());
        assert_eq!(traced.len(), 1);
        assert_eq!(traced[0].path, "src/util.mjs");
        assert!(traced[0].preview.contains("helper"));
    }

    #[test]
    fn trace_never_reincludes_selected_files() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.mjs",
            "import { b } from \"./b.mjs\";\n",
        );
        write(
            dir.path(),
            "b.mjs",
            "import { a } from \"./a.mjs\";\nexport const b = 1;\n",
        );

        let selected = vec!["a.mjs".to_string(), "b.mjs".to_string()];
        assert!(trace_imports(&selected, dir.path()).is_empty());
    }

    #[test]
    fn project_type_detects_rust_and_android() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Cargo.toml", "[package]");
        assert_eq!(project_type(dir.path()), ProjectType::Rust);

        let dir = TempDir::new().unwrap();
        write(dir.path(), "build.gradle", "");
        fs::create_dir_all(dir.path().join("app")).unwrap();
        assert_eq!(project_type(dir.path()), ProjectType::Android);
    }

    #[test]
    fn grep_reports_file_and_line() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", "fn alpha() {}\n// TODO: beta\n");
        let matches = grep_project(dir.path(), "todo");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file, "src/lib.rs");
        assert_eq!(matches[0].line, 2);
    }
}
