//! Command-line arguments.
use clap::Parser;
use std::path::PathBuf;

/// Provision a Node.js application, its database, and pm2 on this host.
///
/// Answers and completed steps are kept in the state directory, so an
/// interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(
    name = "hostkit",
    version,
    about = "Resumable single-host web application provisioner",
    after_help = "State directory: --state-dir, else $HOSTKIT_STATE_DIR, else the user data dir.\nLog filter: $HOSTKIT_LOG (default info)."
)]
pub struct Args {
    /// Directory holding config.env and progress.log
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log at debug level unless HOSTKIT_LOG is set
    #[arg(long, short)]
    pub verbose: bool,
}
