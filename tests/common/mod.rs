//! Shared test infrastructure for integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Answers for a PocketBase session without CI.
pub const POCKETBASE_CONFIG: &str = "\
app_name=demo
app_port=3000
db_choice=1
enable_ci=n
github_token=
install_root=/var/www
node_major=20
pocketbase_port=8090
pocketbase_version=0.22.21
repo_branch=main
repo_url=https://github.com/acme/demo.git
";

/// Every step that applies to `POCKETBASE_CONFIG`.
pub const POCKETBASE_STEPS: &[&str] = &[
    "system_setup",
    "nodejs_setup",
    "pocketbase_setup",
    "app_deploy",
    "pm2_setup",
];

/// A state directory the hostkit binary is pointed at.
pub struct StateFixture {
    dir: TempDir,
}

impl StateFixture {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("temp state dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.env")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root().join("progress.log")
    }

    pub fn seed(&self, config: &str, completed: &[&str]) {
        std::fs::write(self.config_path(), config).expect("seed config.env");
        let mut ledger = completed.join("\n");
        ledger.push('\n');
        std::fs::write(self.ledger_path(), ledger).expect("seed progress.log");
    }

    /// Run hostkit against this state directory, feeding `stdin` as the
    /// operator's answers.
    pub fn run(&self, stdin: &str) -> Output {
        self.run_command(self.command(), stdin)
    }

    /// Like [`run`](Self::run), with `PATH` replaced so only the tools in
    /// `path` can be found.
    pub fn run_with_path(&self, stdin: &str, path: &Path) -> Output {
        let mut command = self.command();
        command.env("PATH", path);
        self.run_command(command, stdin)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_hostkit"));
        command
            .arg("--state-dir")
            .arg(self.root())
            .env("HOSTKIT_LOG", "off")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn run_command(&self, mut command: Command, stdin: &str) -> Output {
        let mut child = command.spawn().expect("spawn hostkit");
        child
            .stdin
            .take()
            .expect("hostkit stdin")
            .write_all(stdin.as_bytes())
            .expect("write answers");
        child.wait_with_output().expect("wait for hostkit")
    }
}
