//! HTTPS downloads for install steps.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Instant;

pub trait Downloader {
    /// Fetch `url` into `dest`. `dest` is replaced atomically, so an
    /// interrupted download never leaves a truncated file behind.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let parent = dest
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

        let start = Instant::now();
        let response = ureq::get(url)
            .call()
            .with_context(|| format!("download {url}"))?;
        let mut reader = response.into_body().into_reader();
        let mut staged = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        let bytes = std::io::copy(&mut reader, &mut staged)
            .with_context(|| format!("read body of {url}"))?;
        staged
            .persist(dest)
            .with_context(|| format!("write {}", dest.display()))?;

        tracing::info!(
            url,
            bytes,
            elapsed_ms = start.elapsed().as_millis(),
            "download complete"
        );
        Ok(())
    }
}
