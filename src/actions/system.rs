use super::ActionContext;
use crate::runner::StepAction;
use crate::shell::{CommandRunner, CommandSpec};
use anyhow::Result;

pub const BASE_PACKAGES: &[&str] = &[
    "curl",
    "git",
    "build-essential",
    "ca-certificates",
    "unzip",
];

pub struct SystemSetup;

impl<'a> StepAction<ActionContext<'a>> for SystemSetup {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        ensure_packages(ctx.shell, BASE_PACKAGES)
    }
}

/// Install whichever of `packages` dpkg does not report as installed.
/// `apt-get update` only runs when something is actually missing.
pub(crate) fn ensure_packages(shell: &mut dyn CommandRunner, packages: &[&str]) -> Result<()> {
    let missing = missing_packages(shell, packages)?;
    if missing.is_empty() {
        tracing::info!(packages = packages.len(), "packages already installed");
        return Ok(());
    }
    tracing::info!(missing = %missing.join(" "), "installing packages");
    shell.run(&apt_get().arg("update").stream())?;
    shell.run(
        &apt_get()
            .args(["install", "-y", "--no-install-recommends"])
            .args(missing)
            .stream(),
    )?;
    Ok(())
}

pub(crate) fn missing_packages<'p>(
    shell: &mut dyn CommandRunner,
    packages: &[&'p str],
) -> Result<Vec<&'p str>> {
    let mut missing = Vec::new();
    for package in packages {
        let output = shell.output(
            &CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", package]),
        )?;
        if !(output.success() && output.stdout.contains("install ok installed")) {
            missing.push(*package);
        }
    }
    Ok(missing)
}

pub(crate) fn apt_get() -> CommandSpec {
    CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}
