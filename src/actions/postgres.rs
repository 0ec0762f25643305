use super::system::ensure_packages;
use super::ActionContext;
use crate::runner::StepAction;
use crate::settings::Database;
use crate::shell::{CommandRunner, CommandSpec};
use anyhow::{bail, Result};

const PACKAGES: &[&str] = &["postgresql", "postgresql-contrib"];

/// Idempotent role and database provisioning. Identifiers and the password
/// arrive as psql variables and are quoted by psql itself; the password is
/// `\set` on stdin so it never shows up in the process list.
const PROVISION_SQL: &str = r#"SELECT format('CREATE ROLE %I', :'role')
WHERE NOT EXISTS (SELECT FROM pg_roles WHERE rolname = :'role')
\gexec
ALTER ROLE :"role" WITH LOGIN PASSWORD :'password';
SELECT format('CREATE DATABASE %I OWNER %I', :'db', :'role')
WHERE NOT EXISTS (SELECT FROM pg_database WHERE datname = :'db')
\gexec
"#;

pub struct PostgresSetup;

impl<'a> StepAction<ActionContext<'a>> for PostgresSetup {
    fn run(&self, ctx: &mut ActionContext<'a>) -> Result<()> {
        let Database::Postgres {
            name,
            user,
            password,
        } = &ctx.settings.database
        else {
            bail!("PostgreSQL was not selected for this session");
        };

        ensure_packages(ctx.shell, PACKAGES)?;
        ensure_running(ctx.shell)?;
        ctx.shell.run(&provision(name, user, password))?;
        tracing::info!(database = %name, role = %user, "database ready");
        Ok(())
    }
}

fn ensure_running(shell: &mut dyn CommandRunner) -> Result<()> {
    if shell.has_tool("systemctl") {
        shell.run(
            &CommandSpec::new("systemctl")
                .args(["enable", "--now", "postgresql"])
                .best_effort("systemd is not running inside most containers"),
        )?;
    }
    if shell.probe(&CommandSpec::new("pg_isready").arg("-q"))? {
        return Ok(());
    }
    shell.run(&CommandSpec::new("service").args(["postgresql", "start"]))?;
    Ok(())
}

fn provision(name: &str, user: &str, password: &str) -> CommandSpec {
    CommandSpec::new("runuser")
        .args(["-u", "postgres", "--", "psql", "-X", "-q"])
        .args(["-v", "ON_ERROR_STOP=1"])
        .arg("-v")
        .arg(format!("role={user}"))
        .arg("-v")
        .arg(format!("db={name}"))
        .stdin(format!(
            "\\set password {}\n{PROVISION_SQL}",
            psql_quote(password)
        ))
}

/// Single-quoted psql meta-command argument.
fn psql_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{pocketbase_settings, postgres_settings};
    use crate::net::testing::FakeDownloader;
    use crate::settings::AppSettings;
    use crate::shell::testing::RecordingRunner;
    use std::path::Path;

    fn run(shell: &mut RecordingRunner, settings: &AppSettings) -> Result<()> {
        let downloader = FakeDownloader::default();
        let mut ctx = ActionContext {
            settings,
            shell,
            downloader: &downloader,
        };
        PostgresSetup.run(&mut ctx)
    }

    fn installed() -> RecordingRunner {
        RecordingRunner::default().reply("dpkg-query", 0, "install ok installed")
    }

    #[test]
    fn password_travels_on_stdin_not_argv() {
        let mut shell = installed();
        run(&mut shell, &postgres_settings(Path::new("/srv"))).expect("postgres setup");

        let psql = shell
            .commands
            .iter()
            .find(|spec| spec.program == "runuser")
            .expect("psql invocation");
        assert!(psql.args.iter().all(|arg| !arg.contains("p@ss")));
        assert!(psql.args.contains(&"role=demo_user".to_string()));
        assert!(psql.args.contains(&"db=demo_db".to_string()));
        let sql = psql.stdin.as_deref().expect("sql on stdin");
        assert!(sql.starts_with("\\set password 'p@ss word'\n"));
        assert!(!sql.contains("demo_user"));
        assert!(sql.contains(":'password'"));
    }

    #[test]
    fn psql_quoting_escapes_quotes_backslashes_and_newlines() {
        assert_eq!(psql_quote("plain"), "'plain'");
        assert_eq!(psql_quote("it's"), "'it''s'");
        assert_eq!(psql_quote("a\\b"), "'a\\\\b'");
        assert_eq!(psql_quote("x\ny"), "'x\\ny'");
    }

    #[test]
    fn running_server_is_not_restarted() {
        let mut shell = installed();
        run(&mut shell, &postgres_settings(Path::new("/srv"))).expect("postgres setup");
        assert!(shell.ran("systemctl enable --now postgresql"));
        assert!(shell.ran("pg_isready -q"));
        assert!(!shell.ran("service postgresql start"));
        assert!(!shell.ran("apt-get"));
    }

    #[test]
    fn server_is_started_without_systemd() {
        let mut shell = installed()
            .missing_tool("systemctl")
            .reply("pg_isready", 2, "");
        run(&mut shell, &postgres_settings(Path::new("/srv"))).expect("postgres setup");
        assert!(!shell.ran("systemctl"));
        assert!(shell.ran("service postgresql start"));
    }

    #[test]
    fn systemctl_failure_is_tolerated() {
        let mut shell = installed().reply("systemctl", 1, "");
        run(&mut shell, &postgres_settings(Path::new("/srv"))).expect("postgres setup");
        assert!(shell.ran("runuser -u postgres -- psql"));
    }

    #[test]
    fn psql_failure_fails_the_step() {
        let mut shell = installed().reply("runuser", 3, "");
        let err = run(&mut shell, &postgres_settings(Path::new("/srv"))).expect_err("psql");
        let message = err.to_string();
        assert!(message.contains("runuser -u postgres -- psql"));
        assert!(!message.contains("p@ss"));
    }

    #[test]
    fn refuses_to_run_for_pocketbase_sessions() {
        let mut shell = installed();
        assert!(run(&mut shell, &pocketbase_settings(Path::new("/srv"))).is_err());
        assert!(shell.commands.is_empty());
    }
}
