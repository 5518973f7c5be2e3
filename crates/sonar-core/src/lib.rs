use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

// Perplexity Sonar API model aliases.
pub const SONAR_PRO_MODEL: &str = "sonar-pro";
pub const SONAR_REASONING_MODEL: &str = "sonar-reasoning";
pub const SONAR_FAST_MODEL: &str = "sonar";

/// Environment variable holding the API credential. Startup is gated on it.
pub const API_KEY_ENV: &str = "PPLX_API_KEY";

/// Per-project runtime directory holding settings, sessions, snippets,
/// brain, backups and the session log.
pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".sonar")
}

#[derive(Debug, thiserror::Error)]
pub enum SonarError {
    #[error("blocked path (outside project root): {path}")]
    PathEscape { path: String },
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },
    #[error("usage: {usage}")]
    Parse { usage: String },
    #[error("API error: {message}")]
    Api { message: String },
}

// ── Conversation state ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in the conversation buffer. Insertion order is
/// chronological and meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, size-bounded turn buffer shared by every command handler.
///
/// All operations mutate the buffer in place — handlers hold a live
/// reference through `SessionContext`, so returning a fresh buffer would
/// silently fork state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Drop oldest turns first until at most `2 * max_history` remain.
    pub fn truncate_to_window(&mut self, max_history: usize) {
        let cap = max_history.saturating_mul(2);
        if self.turns.len() > cap {
            let excess = self.turns.len() - cap;
            self.turns.drain(..excess);
        }
    }

    /// Replace everything except the last `keep_last` turns with a single
    /// synthetic system summary turn. No-op when there is nothing before
    /// the kept tail.
    pub fn compress(&mut self, keep_last: usize, summary: impl Into<String>) -> bool {
        if self.turns.len() <= keep_last {
            return false;
        }
        let tail = self.turns.split_off(self.turns.len() - keep_last);
        self.turns.clear();
        self.turns.push(ConversationTurn::system(summary));
        self.turns.extend(tail);
        true
    }

    pub fn clear(&mut self, keep_system: bool) {
        if keep_system {
            self.turns.retain(|t| t.role == Role::System);
        } else {
            self.turns.clear();
        }
    }
}

// ── Chat client interface types ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f64,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Process-lifetime token and cost accounting across all requests.
#[derive(Debug, Clone, Default)]
pub struct UsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub requests: u64,
    pub cost_usd: f64,
}

impl UsageStats {
    // Sonar Pro list prices: $3/M input, $15/M output.
    const INPUT_USD_PER_TOKEN: f64 = 3.0 / 1_000_000.0;
    const OUTPUT_USD_PER_TOKEN: f64 = 15.0 / 1_000_000.0;

    pub fn record(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.requests += 1;
        self.cost_usd += usage.prompt_tokens as f64 * Self::INPUT_USD_PER_TOKEN
            + usage.completion_tokens as f64 * Self::OUTPUT_USD_PER_TOKEN;
    }
}

// ── Settings ────────────────────────────────────────────────────────────

/// Flat option map loaded once at startup and persisted on every mutation.
/// Field names serialize in camelCase to stay compatible with the settings
/// file the original tool shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub model: String,
    pub temperature: f64,
    pub edit_temp: f64,
    pub max_history: usize,
    pub max_files_per_query: usize,
    pub ask_permission: bool,
    pub auto_suggest: bool,
    pub git_integration: bool,
    pub conversational_mode: bool,
    pub smart_file_detection: bool,
    pub smart_context: bool,
    pub deep_analysis: bool,
    pub show_file_preview: bool,
    pub syntax: bool,
    pub verbose: bool,
    pub role: String,
    pub aliases: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: SONAR_PRO_MODEL.to_string(),
            temperature: 0.2,
            edit_temp: 0.2,
            max_history: 10,
            max_files_per_query: 8,
            ask_permission: true,
            auto_suggest: true,
            git_integration: true,
            conversational_mode: false,
            smart_file_detection: true,
            smart_context: true,
            deep_analysis: false,
            show_file_preview: true,
            syntax: true,
            verbose: false,
            role: String::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Keys accepted by `settings set`, in display order.
    pub const KEYS: &'static [&'static str] = &[
        "model",
        "temperature",
        "editTemp",
        "maxHistory",
        "maxFilesPerQuery",
        "askPermission",
        "autoSuggest",
        "gitIntegration",
        "conversationalMode",
        "smartFileDetection",
        "smartContext",
        "deepAnalysis",
        "showFilePreview",
        "syntax",
        "verbose",
        "role",
    ];

    /// Apply one `settings set <key> <value>` mutation. Numeric fields are
    /// clamped to sane ranges; unknown keys fail with a `Parse` error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let bool_val = value.eq_ignore_ascii_case("true");
        match key {
            "model" => self.model = value.to_string(),
            "temperature" => self.temperature = parse_temp(key, value)?,
            "editTemp" => self.edit_temp = parse_temp(key, value)?,
            "maxHistory" => self.max_history = parse_count(key, value)?,
            "maxFilesPerQuery" => self.max_files_per_query = parse_count(key, value)?,
            "askPermission" => self.ask_permission = bool_val,
            "autoSuggest" => self.auto_suggest = bool_val,
            "gitIntegration" => self.git_integration = bool_val,
            "conversationalMode" => self.conversational_mode = bool_val,
            "smartFileDetection" => self.smart_file_detection = bool_val,
            "smartContext" => self.smart_context = bool_val,
            "deepAnalysis" => self.deep_analysis = bool_val,
            "showFilePreview" => self.show_file_preview = bool_val,
            "syntax" => self.syntax = bool_val,
            "verbose" => self.verbose = bool_val,
            "role" => self.role = value.to_string(),
            other => {
                return Err(SonarError::Parse {
                    usage: format!("unknown setting '{other}' (see /settings)"),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn parse_temp(key: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value.parse().map_err(|_| SonarError::Parse {
        usage: format!("settings set {key} <number between 0 and 1>"),
    })?;
    Ok(parsed.clamp(0.0, 1.0))
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        SonarError::Parse {
            usage: format!("settings set {key} <positive integer>"),
        }
        .into()
    })
}

// ── Persisted records ───────────────────────────────────────────────────

/// Project summary document used as extra chat context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectBrain {
    pub name: String,
    pub description: String,
    pub architecture: String,
    pub conventions: String,
    pub important_files: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProjectBrain {
    pub fn is_populated(&self) -> bool {
        !self.description.is_empty() || !self.architecture.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub code: String,
    pub saved_at: DateTime<Utc>,
}

/// One saved session file, keyed by a user-chosen tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub saved_at: DateTime<Utc>,
    pub root: PathBuf,
    pub history: Vec<ConversationTurn>,
    pub settings: Settings,
}

// ── Path safety ─────────────────────────────────────────────────────────

/// Resolve `raw` against `root`, normalizing `.` and `..` lexically.
///
/// Returns the resolved path only when it is `root` itself or strictly
/// inside it; anything that escapes fails with `PathEscape`. The check is
/// lexical so it also rejects paths whose target does not exist yet.
pub fn safe_path(root: &Path, raw: &str) -> Result<PathBuf> {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(SonarError::PathEscape {
                        path: raw.to_string(),
                    }
                    .into());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized == root || normalized.starts_with(root) {
        Ok(normalized)
    } else {
        Err(SonarError::PathEscape {
            path: raw.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn truncate_keeps_most_recent_turns_in_order() {
        let mut convo = Conversation::new();
        for i in 0..25 {
            convo.append(turn(Role::User, &format!("m{i}")));
        }
        convo.truncate_to_window(10);
        assert_eq!(convo.len(), 20);
        assert_eq!(convo.turns()[0].content, "m5");
        assert_eq!(convo.turns()[19].content, "m24");
    }

    #[test]
    fn truncate_below_window_is_noop() {
        let mut convo = Conversation::new();
        convo.append(turn(Role::User, "hello"));
        convo.truncate_to_window(10);
        assert_eq!(convo.len(), 1);
    }

    #[test]
    fn compress_replaces_prefix_with_single_system_turn() {
        let mut convo = Conversation::new();
        for i in 0..9 {
            convo.append(turn(Role::User, &format!("m{i}")));
        }
        let original_tail: Vec<_> = convo.turns()[4..].to_vec();
        assert!(convo.compress(5, "summary of earlier turns"));
        assert_eq!(convo.len(), 6);
        assert_eq!(convo.turns()[0].role, Role::System);
        assert_eq!(convo.turns()[0].content, "summary of earlier turns");
        assert_eq!(&convo.turns()[1..], original_tail.as_slice());
    }

    #[test]
    fn compress_is_noop_when_buffer_fits() {
        let mut convo = Conversation::new();
        for i in 0..5 {
            convo.append(turn(Role::User, &format!("m{i}")));
        }
        assert!(!convo.compress(5, "unused"));
        assert_eq!(convo.len(), 5);
        assert!(convo.turns().iter().all(|t| t.role == Role::User));
    }

    #[test]
    fn clear_can_keep_system_turns() {
        let mut convo = Conversation::new();
        convo.append(turn(Role::System, "persona"));
        convo.append(turn(Role::User, "hi"));
        convo.append(turn(Role::Assistant, "hello"));
        convo.clear(true);
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.turns()[0].role, Role::System);
        convo.clear(false);
        assert!(convo.is_empty());
    }

    #[test]
    fn safe_path_rejects_parent_escape_from_any_root() {
        for root in ["/srv/projects/demo", "/", "/home/dev"] {
            let err = safe_path(Path::new(root), "../../etc/passwd");
            assert!(err.is_err(), "escape allowed from {root}");
        }
    }

    #[test]
    fn safe_path_accepts_paths_under_root() {
        let root = Path::new("/srv/projects/demo");
        let resolved = safe_path(root, "src/./main.rs").unwrap();
        assert_eq!(resolved, root.join("src/main.rs"));
        assert_eq!(safe_path(root, ".").unwrap(), root);
        // Dotted segments that stay inside the root are fine.
        let resolved = safe_path(root, "src/../README.md").unwrap();
        assert_eq!(resolved, root.join("README.md"));
    }

    #[test]
    fn safe_path_rejects_absolute_paths_outside_root() {
        let root = Path::new("/srv/projects/demo");
        assert!(safe_path(root, "/etc/passwd").is_err());
        assert!(safe_path(root, "/srv/projects/demo/ok.txt").is_ok());
    }

    #[test]
    fn settings_set_parses_and_clamps() {
        let mut settings = Settings::default();
        settings.set("temperature", "1.7").unwrap();
        assert_eq!(settings.temperature, 1.0);
        settings.set("conversationalMode", "true").unwrap();
        assert!(settings.conversational_mode);
        settings.set("maxHistory", "4").unwrap();
        assert_eq!(settings.max_history, 4);
        assert!(settings.set("noSuchKey", "1").is_err());
        assert!(settings.set("maxHistory", "many").is_err());
    }

    #[test]
    fn settings_round_trip_uses_camel_case_keys() {
        let settings = Settings::default();
        let raw = serde_json::to_string(&settings).unwrap();
        assert!(raw.contains("\"maxHistory\":10"));
        assert!(raw.contains("\"askPermission\":true"));
        let back: Settings = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.model, SONAR_PRO_MODEL);
    }
}
