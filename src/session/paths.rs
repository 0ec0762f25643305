//! Typed paths into the session state directory.
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Environment override for the state directory.
pub const STATE_DIR_ENV: &str = "HOSTKIT_STATE_DIR";

/// Convenience wrapper for locating session artifacts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the state directory: explicit flag > env var > data dir.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        if let Some(path) = std::env::var_os(STATE_DIR_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        // Default to ~/.local/share/hostkit
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("cannot determine home directory"))?;
        Ok(Self::new(data_dir.join("hostkit")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.env` path backing the ConfigStore.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.env")
    }

    /// Return the `progress.log` path backing the ProgressLedger.
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("progress.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_state_dir_wins() {
        let paths = SessionPaths::resolve(Some(Path::new("/tmp/hostkit-explicit")))
            .expect("resolve paths");
        assert_eq!(paths.root(), Path::new("/tmp/hostkit-explicit"));
        assert_eq!(
            paths.config_path(),
            PathBuf::from("/tmp/hostkit-explicit/config.env")
        );
        assert_eq!(
            paths.ledger_path(),
            PathBuf::from("/tmp/hostkit-explicit/progress.log")
        );
    }
}
