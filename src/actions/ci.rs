use super::deploy::git;
use super::ActionContext;
use crate::runner::StepAction;
use crate::settings::AppSettings;
use crate::templates;
use anyhow::{Context, Result};
use std::fs;

const WORKFLOW_PATH: &str = ".github/workflows/deploy.yml";

/// Repository secrets the generated workflow reads.
pub const REQUIRED_SECRETS: &[&str] = &["DEPLOY_HOST", "DEPLOY_USER", "DEPLOY_SSH_KEY"];

pub struct CiWorkflow;

impl<'a> StepAction<ActionContext<'a>> for CiWorkflow {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        let settings = ctx.settings;
        let dir = settings.app_dir();
        let path = dir.join(WORKFLOW_PATH);
        let rendered = render_workflow(settings)?;

        if fs::read_to_string(&path).ok().as_deref() != Some(rendered.as_str()) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&path, &rendered).with_context(|| format!("write {}", path.display()))?;
        }

        let target = dir.display().to_string();
        let target = target.as_str();
        let status = ctx.shell.run(&git(settings).args([
            "-C",
            target,
            "status",
            "--porcelain",
            "--",
            WORKFLOW_PATH,
        ]))?;
        if status.stdout.trim().is_empty() {
            tracing::info!("deploy workflow already committed");
        } else {
            ctx.shell
                .run(&git(settings).args(["-C", target, "add", "--", WORKFLOW_PATH]))?;
            ctx.shell.run(&git(settings).args([
                "-C",
                target,
                "-c",
                "user.name=hostkit",
                "-c",
                "user.email=hostkit@localhost",
                "commit",
                "-m",
                "Add deploy workflow",
                "--",
                WORKFLOW_PATH,
            ]))?;
        }

        let refspec = format!("HEAD:{}", settings.repo_branch);
        ctx.shell.run(
            &git(settings)
                .args(["-C", target, "push", "origin", refspec.as_str()])
                .stream(),
        )?;
        Ok(())
    }
}

fn render_workflow(settings: &AppSettings) -> Result<String> {
    let branch = serde_json::to_string(&settings.repo_branch).context("quote branch")?;
    let branch_sh = shell_words::quote(&settings.repo_branch).into_owned();
    let app_dir = settings.app_dir().display().to_string();
    let app_dir = shell_words::quote(&app_dir).into_owned();
    templates::render(
        templates::DEPLOY_WORKFLOW_YML,
        &[
            ("app_name", settings.app_name.as_str()),
            ("app_dir", app_dir.as_str()),
            ("branch", branch.as_str()),
            ("branch_sh", branch_sh.as_str()),
        ],
    )
}
