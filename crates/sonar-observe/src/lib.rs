use anyhow::Result;
use chrono::Utc;
use sonar_core::runtime_dir;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only session log plus optional verbose stderr echo.
///
/// Every REPL iteration records dispatched commands and errors here so a
/// session can be reconstructed after the fact without any terminal
/// scroll-back.
pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            verbose: false,
        })
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Record a command dispatch or other session event.
    pub fn record(&self, msg: &str) {
        let _ = self.append_log_line(&format!("{} EVENT {msg}", Utc::now().to_rfc3339()));
        if self.verbose {
            eprintln!("[sonar] {msg}");
        }
    }

    /// Log a message to stderr with `[sonar]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[sonar] {msg}");
        }
    }

    /// Log a warning — always written to the log file and to stderr.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[sonar WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_appends_timestamped_lines() {
        let dir = TempDir::new().unwrap();
        let observer = Observer::new(dir.path()).unwrap();
        observer.record("dispatch help");
        observer.warn_log("something odd");

        let raw = std::fs::read_to_string(observer.log_path()).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("EVENT dispatch help"));
        assert!(lines[1].contains("WARN something odd"));
    }
}
