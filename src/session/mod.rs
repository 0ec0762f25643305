//! Session state: the configuration store and the progress ledger, plus the
//! resume-or-discard gate run at startup.
mod config_store;
mod ledger;
mod paths;

pub use config_store::ConfigStore;
pub use ledger::ProgressLedger;
pub use paths::SessionPaths;

use crate::error::ProvisionError;
use crate::prompt::Elicit;
use anyhow::Result;

/// How the current invocation relates to earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    /// Nothing persisted; a new session begins.
    Fresh,
    /// Persisted configuration and progress are reused.
    Resumed,
    /// The operator threw the previous session away.
    Discarded,
}

#[derive(Debug)]
pub struct Session {
    pub config: ConfigStore,
    pub ledger: ProgressLedger,
}

impl Session {
    /// Load both stores from the state directory.
    pub fn open(paths: &SessionPaths) -> Result<Self> {
        Ok(Self {
            config: ConfigStore::load(paths.config_path())?,
            ledger: ProgressLedger::load(paths.ledger_path())?,
        })
    }

    /// Ask once whether to resume a non-empty session. Discarding clears both
    /// stores; there is no per-key choice.
    pub fn resume_or_discard(&mut self, elicitor: &mut dyn Elicit) -> Result<SessionStart> {
        if self.config.is_empty() {
            if !self.ledger.is_empty() {
                // Progress without the answers that produced it cannot be
                // trusted against a new set of answers.
                tracing::warn!(
                    ledger = %self.ledger.path().display(),
                    "discarding progress recorded without configuration"
                );
                self.ledger.clear()?;
            }
            return Ok(SessionStart::Fresh);
        }

        let completed = self.ledger.completed().count();
        println!(
            "Found a previous session in {} ({} settings, {} completed steps).",
            self.config.path().display(),
            self.config.entries().len(),
            completed
        );
        let answer = elicitor.elicit("Resume previous session? [Y/n]: ", false)?;
        if parse_yes_no(&answer, true).ok_or_else(|| ProvisionError::InvalidValue {
            key: "resume".to_string(),
            reason: format!("expected y or n (got {answer:?})"),
        })? {
            tracing::info!(completed, "resuming previous session");
            return Ok(SessionStart::Resumed);
        }

        self.discard()?;
        tracing::info!("previous session discarded");
        Ok(SessionStart::Discarded)
    }

    /// Clear the ledger before the store so a crash in between still leaves a
    /// session that asks to resume.
    pub fn discard(&mut self) -> Result<()> {
        self.ledger.clear()?;
        self.config.clear()
    }
}

/// Parse a y/n answer; empty selects `default`.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
