//! Top-level run: root phase in-process, then the user phase re-invoked as
//! the target account.
//!
//! The hand-off is a plain command: this binary's own `user-phase`
//! subcommand wrapped in a [`RunAs`], so the identity switch is visible in
//! the command itself rather than hidden in process state.

use std::path::PathBuf;

use crate::error::{ProvisionError, Result};
use crate::identity::{require_superuser, IdentityProbe};
use crate::io;
use crate::log::ExecLog;
use crate::params::Params;
use crate::profile::Profile;
use crate::root_phase;
use crate::runner::{CommandRunner, CommandSpec, RunAs};

/// How to re-invoke this program for the user phase.
#[derive(Debug, Clone)]
pub struct Handoff {
    /// Absolute path of the executable to run as the target account.
    pub exe: PathBuf,
    /// Global flags to forward ahead of the subcommand (`--config`, `--log-dir`).
    pub global_args: Vec<String>,
}

impl Handoff {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            global_args: Vec::new(),
        }
    }

    pub fn global_arg(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.global_args.push(flag.to_string());
        self.global_args.push(value.into());
        self
    }

    pub fn command(&self, params: &Params, home: PathBuf) -> CommandSpec {
        let spec = CommandSpec::new(self.exe.display().to_string())
            .args(self.global_args.iter().cloned())
            .arg("user-phase");
        params.append_to(spec).run_as(RunAs {
            user: params.user.to_string(),
            home,
        })
    }

    /// Fails unless any account can execute `exe`. The target account does
    /// not exist yet when this runs, so only the mode bits are consulted.
    pub fn verify(&self) -> Result<()> {
        let reachable = io::others_can_execute(&self.exe).map_err(|_| {
            ProvisionError::InvalidArgument {
                field: "executable",
                value: self.exe.display().to_string(),
                reason: "cannot be inspected",
            }
        })?;
        if !reachable {
            return Err(ProvisionError::ExecutableUnreachable(
                self.exe.display().to_string(),
            ));
        }
        Ok(())
    }
}

fn phase_failed(index: usize, step: &str, source: ProvisionError) -> ProvisionError {
    ProvisionError::StepFailed {
        index,
        step: step.to_string(),
        source: Box::new(source),
    }
}

/// Provision end to end. Stops at the first failing phase; nothing already
/// applied is rolled back. `root_log` is not written to before the
/// superuser check passes.
pub fn run(
    params: &Params,
    profile: &Profile,
    handoff: &Handoff,
    identity: &dyn IdentityProbe,
    runner: &mut dyn CommandRunner,
    log: &mut dyn ExecLog,
    root_log: &mut dyn ExecLog,
) -> Result<()> {
    require_superuser(identity)?;
    handoff.verify()?;
    log.info(&format!(
        "provisioning site {} for account {}",
        params.site, params.user
    ))?;

    log.info("[1/2] root phase")?;
    root_phase::run(&params.user, profile, identity, runner, root_log)
        .map_err(|e| phase_failed(1, "root phase", e))?;
    log.info("[1/2] done")?;

    log.info("[2/2] user phase")?;
    let home = identity
        .home_of(params.user.as_str())
        .map_err(|e| phase_failed(2, "user phase", e))?;
    let cmd = handoff.command(params, home);
    log.info(&format!("  $ {}", cmd.display()))?;
    runner
        .run(&cmd)
        .map_err(|e| phase_failed(2, "user phase", e))?;
    log.info("[2/2] done")?;

    log.info("provisioning complete")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
