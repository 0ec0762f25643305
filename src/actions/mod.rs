//! Concrete provisioning steps and their declaration order.
//!
//! Order is part of the contract: every step may assume the side effects of
//! the steps above it (Node.js exists before pm2 is installed through npm,
//! the checkout exists before the process manager points at it).
mod ci;
mod deploy;
mod nodejs;
mod pm2;
mod pocketbase;
mod postgres;
mod system;

pub use ci::REQUIRED_SECRETS;

use crate::net::Downloader;
use crate::runner::Step;
use crate::settings::AppSettings;
use crate::shell::CommandRunner;

pub const SYSTEM_SETUP: &str = "system_setup";
pub const NODEJS_SETUP: &str = "nodejs_setup";
pub const POSTGRES_SETUP: &str = "postgres_setup";
pub const POCKETBASE_SETUP: &str = "pocketbase_setup";
pub const APP_DEPLOY: &str = "app_deploy";
pub const PM2_SETUP: &str = "pm2_setup";
pub const CI_WORKFLOW: &str = "ci_workflow";

/// Everything a step action may touch.
pub struct ActionContext<'a> {
    pub settings: &'a AppSettings,
    pub shell: &'a mut dyn CommandRunner,
    pub downloader: &'a dyn Downloader,
}

/// The provisioning sequence, in execution order.
pub fn standard_steps<'a>() -> Vec<Step<ActionContext<'a>>> {
    vec![
        Step::new(
            SYSTEM_SETUP,
            "installing base system packages",
            system::SystemSetup,
        ),
        Step::new(NODEJS_SETUP, "installing Node.js", nodejs::NodeSetup),
        Step::new(
            POSTGRES_SETUP,
            "provisioning PostgreSQL",
            postgres::PostgresSetup,
        )
        .when(|ctx| ctx.settings.uses_postgres()),
        Step::new(
            POCKETBASE_SETUP,
            "installing PocketBase",
            pocketbase::PocketBaseSetup,
        )
        .when(|ctx| ctx.settings.uses_pocketbase()),
        Step::new(APP_DEPLOY, "deploying application code", deploy::AppDeploy),
        Step::new(PM2_SETUP, "configuring pm2", pm2::Pm2Setup),
        Step::new(
            CI_WORKFLOW,
            "pushing continuous deployment workflow",
            ci::CiWorkflow,
        )
        .when(|ctx| ctx.settings.enable_ci),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::settings::{AppSettings, Database, DEFAULT_POCKETBASE_VERSION};
    use std::path::Path;

    pub(crate) fn pocketbase_settings(install_root: &Path) -> AppSettings {
        AppSettings {
            app_name: "demo".to_string(),
            repo_url: "https://github.com/acme/demo.git".to_string(),
            repo_branch: "main".to_string(),
            github_token: None,
            install_root: install_root.to_path_buf(),
            app_port: 3000,
            node_major: 20,
            database: Database::PocketBase {
                version: DEFAULT_POCKETBASE_VERSION.to_string(),
                port: 8090,
            },
            enable_ci: false,
        }
    }

    pub(crate) fn postgres_settings(install_root: &Path) -> AppSettings {
        AppSettings {
            database: Database::Postgres {
                name: "demo_db".to_string(),
                user: "demo_user".to_string(),
                password: "p@ss word".to_string(),
            },
            ..pocketbase_settings(install_root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{pocketbase_settings, postgres_settings};
    use super::*;
    use crate::net::testing::FakeDownloader;
    use crate::shell::testing::RecordingRunner;
    use std::path::Path;

    fn applicable(settings: &AppSettings) -> Vec<&'static str> {
        let mut shell = RecordingRunner::default();
        let downloader = FakeDownloader::default();
        let ctx = ActionContext {
            settings,
            shell: &mut shell,
            downloader: &downloader,
        };
        let steps = standard_steps();
        let mut ids = Vec::new();
        for step in &steps {
            if step.applies(&ctx) {
                ids.push(step.id());
            }
        }
        ids
    }

    #[test]
    fn declaration_order_is_fixed() {
        let ids: Vec<_> = standard_steps().iter().map(|step| step.id()).collect();
        assert_eq!(
            ids,
            vec![
                SYSTEM_SETUP,
                NODEJS_SETUP,
                POSTGRES_SETUP,
                POCKETBASE_SETUP,
                APP_DEPLOY,
                PM2_SETUP,
                CI_WORKFLOW
            ]
        );
    }

    #[test]
    fn database_choice_selects_exactly_one_database_step() {
        let root = Path::new("/srv");
        let pocketbase = applicable(&pocketbase_settings(root));
        assert!(pocketbase.contains(&POCKETBASE_SETUP));
        assert!(!pocketbase.contains(&POSTGRES_SETUP));

        let postgres = applicable(&postgres_settings(root));
        assert!(postgres.contains(&POSTGRES_SETUP));
        assert!(!postgres.contains(&POCKETBASE_SETUP));
    }

    #[test]
    fn ci_step_follows_the_setting() {
        let mut settings = pocketbase_settings(Path::new("/srv"));
        assert!(!applicable(&settings).contains(&CI_WORKFLOW));
        settings.enable_ci = true;
        assert!(applicable(&settings).contains(&CI_WORKFLOW));
    }
}
