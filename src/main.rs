mod actions;
mod cli;
mod error;
mod logging;
mod net;
mod prompt;
mod runner;
mod session;
mod settings;
mod shell;
mod templates;

use actions::ActionContext;
use anyhow::Result;
use clap::Parser;
use net::HttpDownloader;
use prompt::{LineElicitor, PromptSource};
use runner::{RunReport, StepRunner};
use session::{Session, SessionPaths};
use shell::SystemRunner;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(error::exit_code_for(&err))
        }
    }
}

fn run(args: &cli::Args) -> Result<u8> {
    let paths = SessionPaths::resolve(args.state_dir.as_deref())?;
    tracing::debug!(state_dir = %paths.root().display(), "opening session");
    let mut session = Session::open(&paths)?;
    let mut elicitor = LineElicitor::stdio();

    let start = session.resume_or_discard(&mut elicitor)?;
    tracing::debug!(?start, "session ready");
    let settings = {
        let mut prompts = PromptSource::new(&mut session.config, &mut elicitor);
        settings::collect(&mut prompts)?
    };

    let mut shell = SystemRunner;
    let downloader = HttpDownloader;
    let mut ctx = ActionContext {
        settings: &settings,
        shell: &mut shell,
        downloader: &downloader,
    };
    let steps = actions::standard_steps();
    let report = StepRunner.run(&steps, &mut ctx, &mut session.ledger)?;
    print_summary(&report);

    if let Some(err) = report.halt() {
        eprintln!("{err}");
        if err.is_tool_unavailable() {
            eprintln!("Install the missing tool and run hostkit again to resume.");
        } else {
            eprintln!("Fix the cause and run hostkit again to resume from this step.");
        }
        return Ok(err.exit_code());
    }

    println!("{} is provisioned.", settings.app_name);
    if settings.enable_ci {
        println!(
            "Add these repository secrets on GitHub before the first deploy: {}",
            actions::REQUIRED_SECRETS.join(", ")
        );
    }
    Ok(0)
}

fn print_summary(report: &RunReport) {
    for (id, state) in &report.steps {
        println!("  {id:<18} {}", state.label());
    }
}
