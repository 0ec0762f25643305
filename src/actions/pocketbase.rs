use super::ActionContext;
use crate::runner::StepAction;
use crate::settings::Database;
use crate::shell::{CommandRunner, CommandSpec};
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

pub struct PocketBaseSetup;

impl<'a> StepAction<ActionContext<'a>> for PocketBaseSetup {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        let Database::PocketBase { version, .. } = &ctx.settings.database else {
            bail!("PocketBase was not selected for this session");
        };
        let dir = ctx.settings.pocketbase_dir();
        let binary = dir.join("pocketbase");

        match installed_version(ctx.shell, &binary)? {
            Some(found) if found == *version => {
                tracing::info!(version = %found, "pocketbase already installed");
            }
            found => {
                if let Some(found) = found {
                    tracing::info!(found = %found, wanted = %version, "replacing pocketbase");
                }
                fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
                let url = release_url(version, release_arch(std::env::consts::ARCH)?);
                let staging =
                    tempfile::tempdir().context("create staging dir for pocketbase download")?;
                let archive = staging.path().join("pocketbase.zip");
                ctx.downloader
                    .download(&url, &archive)
                    .context("fetch PocketBase release")?;
                ctx.shell.run(
                    &CommandSpec::new("unzip")
                        .arg("-o")
                        .arg(archive.display().to_string())
                        .arg("pocketbase")
                        .arg("-d")
                        .arg(dir.display().to_string()),
                )?;
                if !binary.is_file() {
                    bail!("{url} did not contain a pocketbase binary");
                }
            }
        }

        let data = dir.join("pb_data");
        fs::create_dir_all(&data).with_context(|| format!("create {}", data.display()))?;
        Ok(())
    }
}

fn release_url(version: &str, arch: &str) -> String {
    format!(
        "https://github.com/pocketbase/pocketbase/releases/download/v{version}/pocketbase_{version}_linux_{arch}.zip"
    )
}

fn release_arch(arch: &str) -> Result<&'static str> {
    match arch {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        "arm" => Ok("armv7"),
        other => Err(anyhow!("no PocketBase release for architecture {other}")),
    }
}

/// Version reported by an existing binary, e.g. `pocketbase version 0.22.21`.
fn installed_version(shell: &mut dyn CommandRunner, binary: &Path) -> Result<Option<String>> {
    if !binary.is_file() {
        return Ok(None);
    }
    let output = shell.output(&CommandSpec::new(binary.display().to_string()).arg("--version"))?;
    if !output.success() {
        return Ok(None);
    }
    Ok(output
        .stdout
        .split_whitespace()
        .last()
        .map(|word| word.trim_start_matches('v').to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{pocketbase_settings, postgres_settings};
    use crate::net::testing::FakeDownloader;
    use crate::settings::AppSettings;
    use crate::shell::testing::RecordingRunner;
    use tempfile::TempDir;

    fn run(
        shell: &mut RecordingRunner,
        downloader: &FakeDownloader,
        settings: &AppSettings,
    ) -> Result<()> {
        let mut ctx = ActionContext {
            settings,
            shell,
            downloader,
        };
        PocketBaseSetup.run(&mut ctx)
    }

    fn with_binary(root: &TempDir) -> (AppSettings, String) {
        let settings = pocketbase_settings(root.path());
        let dir = settings.pocketbase_dir();
        fs::create_dir_all(&dir).expect("pocketbase dir");
        let binary = dir.join("pocketbase");
        fs::write(&binary, b"binary").expect("binary");
        (settings, format!("{} --version", binary.display()))
    }

    #[test]
    fn maps_rust_arch_to_release_arch() {
        assert_eq!(release_arch("x86_64").expect("amd64"), "amd64");
        assert_eq!(release_arch("aarch64").expect("arm64"), "arm64");
        assert!(release_arch("riscv64").is_err());
        assert_eq!(
            release_url("0.22.21", "amd64"),
            "https://github.com/pocketbase/pocketbase/releases/download/v0.22.21/pocketbase_0.22.21_linux_amd64.zip"
        );
    }

    #[test]
    fn matching_binary_skips_download_but_keeps_data_dir() {
        let root = TempDir::new().expect("temp dir");
        let (settings, version_cmd) = with_binary(&root);
        let mut shell =
            RecordingRunner::default().reply(&version_cmd, 0, "pocketbase version 0.22.21\n");
        let downloader = FakeDownloader::default();
        run(&mut shell, &downloader, &settings).expect("pocketbase setup");

        assert!(downloader.fetched.borrow().is_empty());
        assert!(!shell.ran("unzip"));
        assert!(settings.pocketbase_dir().join("pb_data").is_dir());
    }

    #[test]
    fn outdated_binary_is_replaced_outside_the_checkout() {
        let root = TempDir::new().expect("temp dir");
        let (settings, version_cmd) = with_binary(&root);
        let mut shell =
            RecordingRunner::default().reply(&version_cmd, 0, "pocketbase version 0.21.3\n");
        let downloader = FakeDownloader::default();
        run(&mut shell, &downloader, &settings).expect("pocketbase setup");

        let fetched = downloader.fetched.borrow();
        assert!(fetched[0].0.contains("/v0.22.21/pocketbase_0.22.21_linux_"));
        let dir = settings.pocketbase_dir();
        assert!(shell.ran(&format!(
            "unzip -o {} pocketbase -d {}",
            fetched[0].1.display(),
            dir.display()
        )));
        assert!(!dir.starts_with(settings.app_dir()));
        assert!(!settings.app_dir().exists());
    }

    #[test]
    fn archive_without_binary_fails_the_step() {
        let root = TempDir::new().expect("temp dir");
        let settings = pocketbase_settings(root.path());
        let mut shell = RecordingRunner::default();
        let downloader = FakeDownloader::default();
        let err = run(&mut shell, &downloader, &settings).expect_err("no binary");
        assert!(err.to_string().contains("did not contain a pocketbase binary"));
        assert!(shell.ran("unzip -o"));
    }

    #[test]
    fn refuses_to_run_for_postgres_sessions() {
        let root = TempDir::new().expect("temp dir");
        let mut shell = RecordingRunner::default();
        let downloader = FakeDownloader::default();
        assert!(run(&mut shell, &downloader, &postgres_settings(root.path())).is_err());
        assert!(shell.commands.is_empty());
    }
}
