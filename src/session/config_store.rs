//! Persisted key/value configuration for one provisioning session.
//!
//! The backing file is a flat `key=value` layout. Every mutation rewrites the
//! whole file through a temp file in the same directory, so a reload always
//! sees exactly one value per key.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Load the store from disk. A missing or empty file is an empty store.
    pub fn load(path: PathBuf) -> Result<Self> {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => parse_entries(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read config {}", path.display()));
            }
        };
        tracing::debug!(path = %path.display(), keys = entries.len(), "config store loaded");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace `key`. Writing an unchanged value touches nothing.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        if value.contains(['\n', '\r']) {
            return Err(anyhow!("config value for {key:?} must be a single line"));
        }
        if self.get(key) == Some(value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    /// Drop every entry and the backing file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove {}", self.path.display())),
        }
    }

    fn persist(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("create state dir {}", parent.display()))?;
        // NamedTempFile is created 0600, which persist() keeps.
        let mut file = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        file.write_all(render_entries(&self.entries).as_bytes())
            .context("write config entries")?;
        file.persist(&self.path)
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

/// Parse `key=value` lines; later duplicates override earlier ones.
pub fn parse_entries(text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        entries.insert(key.to_string(), value.to_string());
    }
    entries
}

pub fn render_entries(entries: &BTreeMap<String, String>) -> String {
    let mut text = String::new();
    for (key, value) in entries {
        text.push_str(key);
        text.push('=');
        text.push_str(value);
        text.push('\n');
    }
    text
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['=', '\n', '\r']) {
        return Err(anyhow!(
            "config keys must be non-empty and contain no '=' or newline (got {key:?})"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_store_tests.rs"]
mod tests;
