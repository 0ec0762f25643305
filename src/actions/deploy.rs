use super::ActionContext;
use crate::runner::StepAction;
use crate::settings::{AppSettings, Database};
use crate::shell::{CommandRunner, CommandSpec};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use url::Url;

pub struct AppDeploy;

impl<'a> StepAction<ActionContext<'a>> for AppDeploy {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        let settings = ctx.settings;
        let root = &settings.install_root;
        fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;

        let dir = settings.app_dir();
        sync_checkout(ctx.shell, settings, &dir)?;
        write_env_file(settings, &dir)?;
        install_dependencies(ctx.shell, &dir)
    }
}

/// `git` with the access token supplied as an HTTP header through
/// `GIT_CONFIG_*`, so it reaches neither argv nor `.git/config`.
pub(super) fn git(settings: &AppSettings) -> CommandSpec {
    let spec = CommandSpec::new("git").env("GIT_TERMINAL_PROMPT", "0");
    let Some(token) = settings.github_token.as_deref() else {
        return spec;
    };
    let credentials = STANDARD.encode(format!("x-access-token:{token}"));
    spec.env("GIT_CONFIG_COUNT", "1")
        .env("GIT_CONFIG_KEY_0", "http.extraHeader")
        .env(
            "GIT_CONFIG_VALUE_0",
            format!("Authorization: Basic {credentials}"),
        )
}

fn sync_checkout(shell: &mut dyn CommandRunner, settings: &AppSettings, dir: &Path) -> Result<()> {
    let branch = settings.repo_branch.as_str();
    let target = dir.display().to_string();
    let target = target.as_str();

    if dir.join(".git").is_dir() {
        tracing::info!(dir = target, branch, "updating existing checkout");
        let remote = format!("origin/{branch}");
        shell.run(
            &git(settings)
                .args(["-C", target, "fetch", "--prune", "origin"])
                .stream(),
        )?;
        shell.run(&git(settings).args([
            "-C",
            target,
            "checkout",
            "-f",
            "-B",
            branch,
            remote.as_str(),
        ]))?;
        return Ok(());
    }

    if dir.exists() {
        let occupied = fs::read_dir(dir)
            .with_context(|| format!("read {}", dir.display()))?
            .next()
            .is_some();
        if occupied {
            bail!(
                "{} exists, is not empty, and is not a git checkout",
                dir.display()
            );
        }
    }

    tracing::info!(dir = target, branch, "cloning repository");
    shell.run(
        &git(settings)
            .args(["clone", "--branch", branch, "--single-branch"])
            .arg(&settings.repo_url)
            .arg(target)
            .stream(),
    )?;
    Ok(())
}

/// Runtime environment for the application. Contains the database
/// password, so it is written owner-only.
fn write_env_file(settings: &AppSettings, dir: &Path) -> Result<()> {
    let mut env = BTreeMap::new();
    env.insert("NODE_ENV", "production".to_string());
    env.insert("PORT", settings.app_port.to_string());
    match &settings.database {
        Database::Postgres {
            name,
            user,
            password,
        } => {
            env.insert("DATABASE_URL", database_url(name, user, password)?);
        }
        Database::PocketBase { port, .. } => {
            env.insert("POCKETBASE_URL", format!("http://127.0.0.1:{port}"));
        }
    }

    let path = dir.join(".env");
    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    for (key, value) in &env {
        writeln!(staged, "{key}={value}").with_context(|| format!("write {}", path.display()))?;
    }
    staged
        .persist(&path)
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote environment file");
    Ok(())
}

fn database_url(name: &str, user: &str, password: &str) -> Result<String> {
    let mut url = Url::parse("postgres://localhost:5432/").context("parse database url")?;
    url.set_username(user)
        .map_err(|()| anyhow!("database user {user:?} cannot be used in a URL"))?;
    url.set_password(Some(password))
        .map_err(|()| anyhow!("database password cannot be used in a URL"))?;
    url.set_path(&format!("/{name}"));
    Ok(url.into())
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

fn install_dependencies(shell: &mut dyn CommandRunner, dir: &Path) -> Result<()> {
    let manifest_path = dir.join("package.json");
    let manifest = fs::read_to_string(&manifest_path)
        .with_context(|| format!("read {}", manifest_path.display()))?;
    let manifest: PackageManifest = serde_json::from_str(&manifest)
        .with_context(|| format!("parse {}", manifest_path.display()))?;

    let install = if dir.join("package-lock.json").is_file() {
        "ci"
    } else {
        "install"
    };
    shell.run(&CommandSpec::new("npm").arg(install).current_dir(dir).stream())?;

    if manifest.scripts.contains_key("build") {
        shell.run(
            &CommandSpec::new("npm")
                .args(["run", "build"])
                .current_dir(dir)
                .env("NODE_ENV", "production")
                .stream(),
        )?;
    } else {
        tracing::info!("package.json declares no build script");
    }
    Ok(())
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
