//! Flat-JSON persistence for settings, sessions, snippets and the project
//! brain. Files are read whole and written whole; every overwrite of a
//! tracked file first copies the prior version into a timestamped backup.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sonar_core::{ProjectBrain, SessionRecord, Settings, Snippet, SonarError, runtime_dir};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";
const SNIPPETS_FILE: &str = "snippets.json";
const BRAIN_FILE: &str = "brain.json";
const SESSIONS_DIR: &str = "sessions";
const BACKUPS_DIR: &str = "backups";

pub struct Store {
    runtime: PathBuf,
}

impl Store {
    pub fn new(workspace: &Path) -> Result<Self> {
        let runtime = runtime_dir(workspace);
        fs::create_dir_all(&runtime)?;
        Ok(Self { runtime })
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Missing or unreadable settings fall back to defaults; the file is
    /// created on the first explicit save.
    pub fn load_settings(&self) -> Settings {
        self.read_json(&self.runtime.join(SETTINGS_FILE))
            .unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_tracked_json(&self.runtime.join(SETTINGS_FILE), settings)
    }

    // ── Sessions ────────────────────────────────────────────────────────

    pub fn save_session(&self, tag: &str, record: &SessionRecord) -> Result<PathBuf> {
        let dir = self.runtime.join(SESSIONS_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{tag}.json"));
        self.write_tracked_json(&path, record)?;
        Ok(path)
    }

    pub fn load_session(&self, tag: &str) -> Result<SessionRecord> {
        let path = self.runtime.join(SESSIONS_DIR).join(format!("{tag}.json"));
        if !path.is_file() {
            return Err(SonarError::NotFound {
                what: "session",
                name: tag.to_string(),
            }
            .into());
        }
        self.read_json(&path)
            .with_context(|| format!("session file {} is corrupt", path.display()))
    }

    /// Saved sessions as `(tag, saved_at)` pairs, newest first.
    pub fn list_sessions(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let dir = self.runtime.join(SESSIONS_DIR);
        let mut sessions = Vec::new();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(sessions);
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(tag) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(record) = self.read_json::<SessionRecord>(&path) {
                sessions.push((tag.to_string(), record.saved_at));
            }
        }
        sessions.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(sessions)
    }

    // ── Snippets ────────────────────────────────────────────────────────

    pub fn load_snippets(&self) -> BTreeMap<String, Snippet> {
        self.read_json(&self.runtime.join(SNIPPETS_FILE))
            .unwrap_or_default()
    }

    pub fn save_snippets(&self, snippets: &BTreeMap<String, Snippet>) -> Result<()> {
        self.write_tracked_json(&self.runtime.join(SNIPPETS_FILE), snippets)
    }

    // ── Brain ───────────────────────────────────────────────────────────

    pub fn load_brain(&self, root: &Path) -> ProjectBrain {
        let mut brain: ProjectBrain = self
            .read_json(&self.runtime.join(BRAIN_FILE))
            .unwrap_or_default();
        if brain.name.is_empty() {
            brain.name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string());
        }
        brain
    }

    pub fn save_brain(&self, brain: &mut ProjectBrain) -> Result<()> {
        brain.last_updated = Some(Utc::now());
        self.write_tracked_json(&self.runtime.join(BRAIN_FILE), brain)
    }

    // ── Workspace file writes with backup ───────────────────────────────

    /// Write `content` to a workspace file, first copying any existing
    /// version into the backup directory.
    pub fn backup_then_write(&self, path: &Path, content: &str) -> Result<Option<PathBuf>> {
        let backup = self.backup_existing(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(backup)
    }

    /// Most recent backup recorded for `file_name`, if any.
    pub fn latest_backup(&self, file_name: &str) -> Result<PathBuf> {
        let dir = self.runtime.join(BACKUPS_DIR);
        let prefix = format!("{file_name}.");
        let mut candidates: Vec<PathBuf> = fs::read_dir(&dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".bak"))
            })
            .collect();
        // Timestamped names sort chronologically.
        candidates.sort();
        candidates.pop().ok_or_else(|| {
            SonarError::NotFound {
                what: "backup",
                name: file_name.to_string(),
            }
            .into()
        })
    }

    fn backup_existing(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !path.is_file() {
            return Ok(None);
        }
        let dir = self.runtime.join(BACKUPS_DIR);
        fs::create_dir_all(&dir)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let backup = dir.join(format!("{name}.{stamp}.bak"));
        fs::copy(path, &backup)?;
        Ok(Some(backup))
    }

    // ── JSON helpers ────────────────────────────────────────────────────

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_tracked_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.backup_existing(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_core::{Conversation, ConversationTurn};
    use tempfile::TempDir;

    #[test]
    fn settings_default_then_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();

        let mut settings = store.load_settings();
        assert_eq!(settings.max_history, 10);

        settings.conversational_mode = true;
        store.save_settings(&settings).unwrap();
        assert!(store.load_settings().conversational_mode);
    }

    #[test]
    fn session_save_load_and_list() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();

        let mut convo = Conversation::new();
        convo.append(ConversationTurn::user("hello"));
        let record = SessionRecord {
            saved_at: Utc::now(),
            root: dir.path().to_path_buf(),
            history: convo.turns().to_vec(),
            settings: Settings::default(),
        };
        store.save_session("demo", &record).unwrap();

        let loaded = store.load_session("demo").unwrap();
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.history[0].content, "hello");

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0, "demo");
    }

    #[test]
    fn missing_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let err = store.load_session("ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SonarError>(),
            Some(SonarError::NotFound { what: "session", .. })
        ));
    }

    #[test]
    fn overwrite_creates_timestamped_backup() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let target = dir.path().join("notes.txt");

        assert!(store.backup_then_write(&target, "v1").unwrap().is_none());
        let backup = store.backup_then_write(&target, "v2").unwrap().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "v2");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "v1");
        assert_eq!(store.latest_backup("notes.txt").unwrap(), backup);
    }

    #[test]
    fn latest_backup_without_history_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        assert!(store.latest_backup("nothing.txt").is_err());
    }

    #[test]
    fn brain_defaults_to_project_name() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let mut brain = store.load_brain(Path::new("/srv/projects/demo"));
        assert_eq!(brain.name, "demo");
        assert!(!brain.is_populated());

        brain.description = "a demo".to_string();
        store.save_brain(&mut brain).unwrap();
        assert!(brain.last_updated.is_some());
        let reloaded = store.load_brain(Path::new("/srv/projects/demo"));
        assert!(reloaded.is_populated());
    }
}
