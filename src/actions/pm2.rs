use super::ActionContext;
use crate::runner::StepAction;
use crate::settings::{AppSettings, Database};
use crate::shell::CommandSpec;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ECOSYSTEM_FILE: &str = "ecosystem.config.json";

#[derive(Debug, Serialize)]
struct Ecosystem {
    apps: Vec<ProcessEntry>,
}

#[derive(Debug, Serialize)]
struct ProcessEntry {
    name: String,
    cwd: PathBuf,
    script: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interpreter: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<&'static str, String>,
}

pub struct Pm2Setup;

impl<'a> StepAction<ActionContext<'a>> for Pm2Setup {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        if !ctx.shell.has_tool("pm2") {
            ctx.shell
                .run(&CommandSpec::new("npm").args(["install", "-g", "pm2"]).stream())?;
        }

        let path = write_ecosystem(ctx.settings)?;
        let path = path.display().to_string();
        ctx.shell.run(
            &CommandSpec::new("pm2")
                .args(["startOrReload", path.as_str(), "--update-env"])
                .stream(),
        )?;
        ctx.shell.run(&CommandSpec::new("pm2").arg("save"))?;
        ctx.shell.run(
            &CommandSpec::new("pm2")
                .arg("startup")
                .best_effort("no supported init system; processes will not restart on boot"),
        )?;
        Ok(())
    }
}

fn ecosystem(settings: &AppSettings) -> Ecosystem {
    let mut apps = vec![ProcessEntry {
        name: settings.app_name.clone(),
        cwd: settings.app_dir(),
        script: "npm".to_string(),
        args: vec!["start".to_string()],
        interpreter: None,
        env: BTreeMap::from([
            ("NODE_ENV", "production".to_string()),
            ("PORT", settings.app_port.to_string()),
        ]),
    }];
    if let Database::PocketBase { port, .. } = &settings.database {
        let dir = settings.pocketbase_dir();
        apps.push(ProcessEntry {
            name: format!("{}-pocketbase", settings.app_name),
            script: dir.join("pocketbase").display().to_string(),
            args: vec![
                "serve".to_string(),
                "--http".to_string(),
                format!("127.0.0.1:{port}"),
                "--dir".to_string(),
                dir.join("pb_data").display().to_string(),
            ],
            cwd: dir,
            interpreter: Some("none"),
            env: BTreeMap::new(),
        });
    }
    Ecosystem { apps }
}

/// Written beside the checkout so `git checkout -f` never touches it.
fn write_ecosystem(settings: &AppSettings) -> Result<PathBuf> {
    let root: &Path = &settings.install_root;
    let path = root.join(format!("{}.{ECOSYSTEM_FILE}", settings.app_name));
    let text =
        serde_json::to_string_pretty(&ecosystem(settings)).context("serialize pm2 ecosystem")?;
    let mut staged = tempfile::NamedTempFile::new_in(root)
        .with_context(|| format!("create temp file in {}", root.display()))?;
    staged
        .write_all(text.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    staged
        .persist(&path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
