//! External command boundary used by every step action.
//!
//! Actions describe commands as [`CommandSpec`] values and hand them to a
//! [`CommandRunner`]; nothing is ever routed through a shell. Tests swap in
//! a recording runner so no test touches the host.
use crate::error::ProvisionError;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

/// A single external command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    /// Stream output to the operator's terminal instead of capturing it.
    pub stream: bool,
    /// When set, a non-zero exit is logged with this reason and ignored.
    pub best_effort: Option<&'static str>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Environment values are never logged.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn best_effort(mut self, reason: &'static str) -> Self {
        self.best_effort = Some(reason);
        self
    }

    /// Shell-quoted rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    /// Execute and return the raw outcome; a non-zero exit is not an error.
    fn output(&mut self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether `program` can be found on PATH.
    fn has_tool(&mut self, program: &str) -> bool;

    /// Execute and require success unless the spec is best-effort.
    fn run(&mut self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.output(spec)?;
        if output.success() {
            return Ok(output);
        }
        if let Some(reason) = spec.best_effort {
            tracing::warn!(
                command = %spec.display(),
                code = ?output.code,
                reason,
                "ignoring best-effort command failure"
            );
            return Ok(output);
        }
        let status = match output.code {
            Some(code) => format!("status {code}"),
            None => "a signal".to_string(),
        };
        let detail = output.stderr.trim().lines().last().unwrap_or_default();
        if detail.is_empty() {
            Err(anyhow!("`{}` exited with {status}", spec.display()))
        } else {
            Err(anyhow!("`{}` exited with {status}: {detail}", spec.display()))
        }
    }

    /// Execute a query command and report only whether it succeeded.
    fn probe(&mut self, spec: &CommandSpec) -> Result<bool> {
        Ok(self.output(spec)?.success())
    }
}

/// Runs commands on the local host.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&mut self, spec: &CommandSpec) -> Result<CommandOutput> {
        let program = which::which(&spec.program).map_err(|_| {
            ProvisionError::ExternalToolUnavailable {
                tool: spec.program.clone(),
            }
        })?;

        let mut command = Command::new(program);
        command.args(&spec.args);
        command.envs(spec.env.iter().map(|(key, value)| (key, value)));
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        command.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if spec.stream {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        tracing::debug!(command = %spec.display(), "running command");
        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("spawn {}", spec.program))?;
        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .with_context(|| format!("write stdin of {}", spec.program))?;
        }
        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {}", spec.program))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            elapsed_ms,
            code = ?output.status.code(),
            command = %spec.display(),
            "command complete"
        );

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn has_tool(&mut self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
