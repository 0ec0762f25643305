//! Append-only record of completed step identifiers.
//!
//! The ledger is the source of truth for "this step already happened"; it is
//! never consulted for partial progress inside a step.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    completed: BTreeSet<String>,
    /// The file's last line lacks its terminator (a torn or hand-edited write).
    unterminated: bool,
}

impl ProgressLedger {
    /// Load the ledger. A missing file is an empty ledger; duplicate lines are
    /// tolerated.
    pub fn load(path: PathBuf) -> Result<Self> {
        let (completed, unterminated) = match fs::read_to_string(&path) {
            Ok(text) => (
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
                !text.is_empty() && !text.ends_with('\n'),
            ),
            Err(err) if err.kind() == ErrorKind::NotFound => (BTreeSet::new(), false),
            Err(err) => {
                return Err(err).with_context(|| format!("read ledger {}", path.display()));
            }
        };
        Ok(Self {
            path,
            completed,
            unterminated,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.completed.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Append `id` to the ledger unless it is already recorded.
    pub fn mark_completed(&mut self, id: &str) -> Result<()> {
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(anyhow!("step identifiers must be single tokens (got {id:?})"));
        }
        if self.has_completed(id) {
            return Ok(());
        }
        if let Some(parent) = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create state dir {}", parent.display()))?;
        }
        let mut options = fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let record = if self.unterminated {
            format!("\n{id}\n")
        } else {
            format!("{id}\n")
        };
        file.write_all(record.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        self.unterminated = false;
        self.completed.insert(id.to_string());
        Ok(())
    }

    /// Forget every completed step.
    pub fn clear(&mut self) -> Result<()> {
        self.completed.clear();
        self.unterminated = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = TempDir::new().expect("temp dir");
        let ledger = ProgressLedger::load(dir.path().join("progress.log")).expect("load");
        assert!(ledger.is_empty());
        assert!(!ledger.has_completed("system_setup"));
    }

    #[test]
    fn marks_append_once_and_survive_reload() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("progress.log");
        let mut ledger = ProgressLedger::load(path.clone()).expect("load");
        ledger.mark_completed("system_setup").expect("mark");
        ledger.mark_completed("nodejs_setup").expect("mark");
        ledger.mark_completed("system_setup").expect("mark again");

        let text = std::fs::read_to_string(&path).expect("read ledger");
        assert_eq!(text, "system_setup\nnodejs_setup\n");

        let reloaded = ProgressLedger::load(path).expect("reload");
        assert!(reloaded.has_completed("system_setup"));
        assert!(reloaded.has_completed("nodejs_setup"));
        assert!(!reloaded.has_completed("app_deploy"));
    }

    #[test]
    fn duplicate_lines_are_tolerated_on_load() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("progress.log");
        std::fs::write(&path, "system_setup\n\nsystem_setup\n  nodejs_setup \n").expect("seed");
        let ledger = ProgressLedger::load(path).expect("load");
        assert_eq!(
            ledger.completed().collect::<Vec<_>>(),
            vec!["nodejs_setup", "system_setup"]
        );
    }

    #[test]
    fn rejects_identifiers_the_line_format_cannot_hold() {
        let dir = TempDir::new().expect("temp dir");
        let mut ledger = ProgressLedger::load(dir.path().join("progress.log")).expect("load");
        assert!(ledger.mark_completed("").is_err());
        assert!(ledger.mark_completed("two words").is_err());
        assert!(ledger.mark_completed(" system_setup").is_err());
        assert!(ledger.mark_completed("system_setup\n").is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn append_after_an_unterminated_last_line_keeps_both_records() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("progress.log");
        std::fs::write(&path, "system_setup").expect("seed");

        let mut ledger = ProgressLedger::load(path.clone()).expect("load");
        ledger.mark_completed("nodejs_setup").expect("mark");
        ledger.mark_completed("app_deploy").expect("mark");

        let text = std::fs::read_to_string(&path).expect("read ledger");
        assert_eq!(text, "system_setup\nnodejs_setup\napp_deploy\n");
        let reloaded = ProgressLedger::load(path).expect("reload");
        assert_eq!(
            reloaded.completed().collect::<Vec<_>>(),
            vec!["app_deploy", "nodejs_setup", "system_setup"]
        );
    }

    #[test]
    fn clear_is_the_only_way_to_shrink() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("progress.log");
        let mut ledger = ProgressLedger::load(path.clone()).expect("load");
        ledger.mark_completed("system_setup").expect("mark");

        ledger.clear().expect("clear");
        assert!(ledger.is_empty());
        assert!(!path.exists());
        assert!(ProgressLedger::load(path).expect("reload").is_empty());
    }
}
