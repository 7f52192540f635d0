//! User phase: runtimes, bench, site, apps, migrations.
//!
//! Runs as the target account. Each step leaves filesystem or database
//! state the next one depends on, so the order built by [`pipeline`] is
//! fixed: runtimes → bench CLI → workspace → site → apps → migrations →
//! developer mode.
//!
//! nvm is a shell function and uv installs into `~/.local/bin`, so every
//! command after the installers runs through `bash -lc` with both sourced.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::identity::{require_account, IdentityProbe};
use crate::log::ExecLog;
use crate::params::Params;
use crate::paths;
use crate::profile::Profile;
use crate::runner::{quote, CommandRunner, CommandSpec, ShellScript};
use crate::step::{CommandStep, Pipeline};

const TOOL_ENV: &str = concat!(
    r#"export NVM_DIR="$HOME/.nvm"; "#,
    r#"[ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"; "#,
    r#"export PATH="$HOME/.local/bin:$PATH""#
);

/// A command line run with nvm and `~/.local/bin` available.
fn with_tools(words: &[&str]) -> ShellScript {
    ShellScript::new().prelude(TOOL_ENV).words(words)
}

/// Builds the bench invocations for one workspace and site.
struct Bench<'a> {
    workspace: PathBuf,
    params: &'a Params,
}

impl Bench<'_> {
    fn script(&self, words: &[&str]) -> ShellScript {
        with_tools(&["bench"]).words(words)
    }

    fn on_site(&self, words: &[&str]) -> ShellScript {
        self.script(&["--site", self.params.site.as_str()]).words(words)
    }

    fn command(&self, script: ShellScript) -> CommandSpec {
        script.into_command().cwd(&self.workspace)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// User-phase steps, in order, for an account whose home is `home`.
pub fn pipeline(params: &Params, profile: &Profile, home: &Path) -> Pipeline {
    let rt = &profile.runtime;
    let bp = &profile.bench;
    let workspace = paths::workspace_dir(home, profile);
    let bench = Bench {
        workspace: workspace.clone(),
        params,
    };
    let mut p = Pipeline::new();

    // 1. Node via nvm, plus yarn.
    p.push(CommandStep::new(
        "install node runtime",
        vec![
            CommandSpec::shell(format!(
                "curl -fsSL -o- {} | bash",
                quote(&rt.nvm_installer_url())
            ))
            .cwd(home),
            with_tools(&["nvm", "install", &rt.node_version])
                .into_command()
                .cwd(home),
            with_tools(&["nvm", "alias", "default", &rt.node_version])
                .into_command()
                .cwd(home),
            with_tools(&["npm", "install", "-g", "yarn"])
                .into_command()
                .cwd(home),
        ],
    ));

    // 2. uv, and a default Python.
    p.push(CommandStep::new(
        "install python toolchain",
        vec![
            CommandSpec::shell(format!("curl -LsSf {} | sh", quote(&rt.uv_installer_url)))
                .cwd(home),
            with_tools(&["uv", "python", "install", &rt.python_version, "--default", "--preview"])
                .into_command()
                .cwd(home),
        ],
    ));

    // 3. Pinned bench CLI.
    let bench_pkg = format!("frappe-bench=={}", bp.version);
    p.push(CommandStep::single(
        "install bench cli",
        with_tools(&[
            "uv",
            "tool",
            "install",
            "--python",
            &rt.python_version,
            &bench_pkg,
        ])
        .into_command()
        .cwd(home),
    ));

    // 4. Workspace.
    let python = format!("python{}", rt.python_version);
    p.push(CommandStep::single(
        "initialize workspace",
        with_tools(&[
            "bench",
            "init",
            &bp.workspace,
            "--frappe-branch",
            &bp.frappe_branch,
            "--python",
            &python,
        ])
        .into_command()
        .cwd(home),
    ));

    // 5. Site.
    p.push(CommandStep::single(
        format!("create site {}", params.site),
        bench.command(
            bench
                .script(&["new-site", params.site.as_str(), "--db-root-password"])
                .secret(params.db_password.expose())
                .word("--admin-password")
                .secret(params.admin_password.expose()),
        ),
    ));

    // 6. Fetch apps.
    for app in &bp.apps {
        let mut words = vec!["get-app"];
        if let Some(branch) = &app.branch {
            words.extend(["--branch", branch.as_str()]);
        }
        words.push(app.url.as_str());
        p.push(CommandStep::single(
            format!("fetch app {}", app.name),
            bench.command(bench.script(&words)),
        ));
    }

    // 7. Extra Python libraries in the workspace env.
    if !bp.python_packages.is_empty() {
        p.push(CommandStep::single(
            "install python packages",
            CommandSpec::new(paths::workspace_pip(&workspace).display().to_string())
                .arg("install")
                .args(bp.python_packages.iter().cloned())
                .cwd(&workspace),
        ));
    }

    // 8. Install apps on the site, in listed order.
    for app in &bp.apps {
        p.push(CommandStep::single(
            format!("install app {}", app.name),
            bench.command(bench.on_site(&["install-app", app.name.as_str()])),
        ));
    }

    // 9. Migrations, one step each.
    let total = bp.migrations.len();
    for (i, path) in bp.migrations.iter().enumerate() {
        p.push(CommandStep::single(
            format!("migration {}/{total}: {path}", i + 1),
            bench.command(bench.on_site(&["execute", path.as_str()])),
        ));
    }

    // 10. Developer mode.
    if bp.developer_mode {
        p.push(CommandStep::single(
            "enable developer mode",
            bench.command(bench.script(&["set-config", "-g", "developer_mode", "1"])),
        ));
    }

    p
}

/// Run the user phase. Fails before touching anything unless the effective
/// login name is the target account.
pub fn run(
    params: &Params,
    profile: &Profile,
    home: &Path,
    identity: &dyn IdentityProbe,
    runner: &mut dyn CommandRunner,
    log: &mut dyn ExecLog,
) -> Result<()> {
    require_account(identity, params.user.as_str())?;
    log.info(&format!(
        "user phase: provisioning site {} for {} in {}",
        params.site,
        params.user,
        home.display()
    ))?;
    // The credentials still travel as bench arguments; only the log is masked.
    tracing::warn!("database root and admin passwords are passed to bench on its command line");
    pipeline(params, profile, home).run(runner, log)?;
    log.info("user phase complete")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::identity::{FixedIdentity, Principal};
    use crate::log::MemoryLog;
    use crate::params::RawParams;
    use crate::runner::RecordingRunner;

    fn params() -> Params {
        Params::from_raw(&RawParams {
            user: Some("svc".to_string()),
            db_password: Some("root1".to_string()),
            site: Some("apps.localhost".to_string()),
            admin_password: Some("admin1".to_string()),
        })
        .unwrap()
    }

    fn svc() -> FixedIdentity {
        FixedIdentity(Principal::new(1001, "svc"))
    }

    #[test]
    fn wrong_identity_runs_nothing() {
        let mut runner = RecordingRunner::new();
        let mut log = MemoryLog::new();
        let err = run(
            &params(),
            &Profile::default(),
            Path::new("/home/svc"),
            &FixedIdentity(Principal::root()),
            &mut runner,
            &mut log,
        )
        .unwrap_err();
        assert!(matches!(err, ProvisionError::IdentityMismatch { .. }));
        assert!(runner.commands.is_empty());
        assert!(log.records.is_empty());
    }

    #[test]
    fn step_order_is_fixed() {
        let p = pipeline(&params(), &Profile::default(), Path::new("/home/svc"));
        let names = p.names();
        assert_eq!(names[0], "install node runtime");
        assert_eq!(names[1], "install python toolchain");
        assert_eq!(names[2], "install bench cli");
        assert_eq!(names[3], "initialize workspace");
        assert_eq!(names[4], "create site apps.localhost");
        assert_eq!(names[5], "fetch app erpnext");
        assert_eq!(names[6], "fetch app hrms");
        assert_eq!(names[7], "install python packages");
        assert_eq!(names[8], "install app erpnext");
        assert_eq!(names[9], "install app hrms");
        assert!(names[10].starts_with("migration 1/7: "));
        assert!(names[16].starts_with("migration 7/7: "));
        assert_eq!(names[17], "enable developer mode");
        assert_eq!(p.len(), 18);
    }

    #[test]
    fn plan_masks_both_passwords() {
        let plan = pipeline(&params(), &Profile::default(), Path::new("/home/svc")).plan();
        let site = plan.iter().find(|s| s.name.starts_with("create site")).unwrap();
        let line = &site.commands[0];
        assert!(line.contains("new-site apps.localhost"));
        assert!(!line.contains("root1"));
        assert!(!line.contains("admin1"));
        assert!(line.starts_with("cd /home/svc/frappe-bench &&"));
    }

    #[test]
    fn bench_commands_see_the_real_secrets() {
        let mut runner = RecordingRunner::new();
        let mut log = MemoryLog::new();
        run(
            &params(),
            &Profile::default(),
            Path::new("/home/svc"),
            &svc(),
            &mut runner,
            &mut log,
        )
        .unwrap();
        assert!(runner.ran("new-site apps.localhost --db-root-password root1 --admin-password admin1"));
        assert!(!log.messages().iter().any(|m| m.contains("root1")));
    }

    #[test]
    fn passwords_with_shell_metacharacters_stay_out_of_the_log() {
        let params = Params::from_raw(&RawParams {
            user: Some("svc".to_string()),
            db_password: Some("it's-r00t".to_string()),
            site: Some("apps.localhost".to_string()),
            admin_password: Some("p@ss $word".to_string()),
        })
        .unwrap();
        let mut runner = RecordingRunner::new();
        let mut log = MemoryLog::new();
        run(
            &params,
            &Profile::default(),
            Path::new("/home/svc"),
            &svc(),
            &mut runner,
            &mut log,
        )
        .unwrap();

        for m in log.messages() {
            assert!(!m.contains("r00t"), "db password leaked: {m}");
            assert!(!m.contains("$word"), "admin password leaked: {m}");
        }
        let site = log.position("new-site").unwrap();
        assert!(log.messages()[site]
            .contains("--db-root-password ******** --admin-password ********"));
        assert!(runner.ran("--db-root-password 'it'\\''s-r00t'"));
    }

    #[test]
    fn pip_runs_from_the_workspace_env() {
        let mut runner = RecordingRunner::new();
        let mut log = MemoryLog::new();
        run(
            &params(),
            &Profile::default(),
            Path::new("/home/svc"),
            &svc(),
            &mut runner,
            &mut log,
        )
        .unwrap();
        let pip = runner
            .commands
            .iter()
            .find(|c| c.program.ends_with("env/bin/pip"))
            .unwrap();
        assert_eq!(pip.program, "/home/svc/frappe-bench/env/bin/pip");
        assert_eq!(pip.args, vec!["install", "pandas"]);
    }

    #[test]
    fn developer_mode_can_be_disabled() {
        let mut profile = Profile::default();
        profile.bench.developer_mode = false;
        let p = pipeline(&params(), &profile, Path::new("/home/svc"));
        assert!(!p.names().contains(&"enable developer mode"));
    }

    #[test]
    fn app_branch_is_passed_to_get_app() {
        let plan = pipeline(&params(), &Profile::default(), Path::new("/home/svc")).plan();
        let fetch = plan.iter().find(|s| s.name == "fetch app hrms").unwrap();
        assert!(fetch.commands[0].contains("get-app --branch version-15 https://github.com/frappe/hrms"));
    }
}
