use super::system::apt_get;
use super::ActionContext;
use crate::runner::StepAction;
use crate::shell::{CommandRunner, CommandSpec};
use anyhow::{bail, Context, Result};
use regex::Regex;

pub struct NodeSetup;

impl<'a> StepAction<ActionContext<'a>> for NodeSetup {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        let major = ctx.settings.node_major;
        if let Some(found) = installed_major(ctx.shell)? {
            if found == major {
                tracing::info!(major, "node already installed");
                return Ok(());
            }
            tracing::info!(found, wanted = major, "replacing node");
        }

        let staging = tempfile::tempdir().context("create staging dir for node setup")?;
        let script = staging.path().join("nodesource_setup.sh");
        ctx.downloader
            .download(&setup_script_url(major), &script)
            .context("fetch NodeSource setup script")?;
        ctx.shell.run(
            &CommandSpec::new("bash")
                .arg(script.display().to_string())
                .stream(),
        )?;
        ctx.shell
            .run(&apt_get().args(["install", "-y", "nodejs"]).stream())?;

        match installed_major(ctx.shell)? {
            Some(found) if found == major => Ok(()),
            Some(found) => {
                bail!("node reports major version {found} after install (wanted {major})")
            }
            None => bail!("node is not runnable after install"),
        }
    }
}

fn setup_script_url(major: u32) -> String {
    format!("https://deb.nodesource.com/setup_{major}.x")
}

fn installed_major(shell: &mut dyn CommandRunner) -> Result<Option<u32>> {
    if !shell.has_tool("node") {
        return Ok(None);
    }
    let output = shell.output(&CommandSpec::new("node").arg("--version"))?;
    if !output.success() {
        return Ok(None);
    }
    Ok(parse_major(&output.stdout))
}

fn parse_major(version: &str) -> Option<u32> {
    let re = Regex::new(r"^v(\d+)\.").expect("regex for node version");
    re.captures(version.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|major| major.as_str().parse().ok())
}
