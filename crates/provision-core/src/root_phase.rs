//! Root phase: OS-level prerequisites for the target account.
//!
//! Runs as the superuser. Every step is idempotent by inspection: it looks
//! at the host first and skips when the work is already done.

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::error::{ProvisionError, Result};
use crate::identity::{require_superuser, IdentityProbe};
use crate::io;
use crate::log::ExecLog;
use crate::params::AccountName;
use crate::profile::Profile;
use crate::runner::{CommandRunner, CommandSpec};
use crate::step::{CommandStep, Pipeline, Step, StepContext, StepOutcome};

// ---------------------------------------------------------------------------
// EnsureAuthorizedKey
// ---------------------------------------------------------------------------

pub struct EnsureAuthorizedKey {
    ssh_dir: PathBuf,
    key: Option<String>,
    key_id: String,
}

impl EnsureAuthorizedKey {
    fn authorized_keys(&self) -> PathBuf {
        self.ssh_dir.join("authorized_keys")
    }
}

impl Step for EnsureAuthorizedKey {
    fn name(&self) -> &str {
        "install admin ssh key"
    }

    fn plan(&self) -> Vec<String> {
        match &self.key {
            Some(_) => vec![format!(
                "append key '{}' to {} unless present",
                self.key_id,
                self.authorized_keys().display()
            )],
            None => vec!["(no admin key configured)".to_string()],
        }
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let Some(key) = &self.key else {
            return Ok(StepOutcome::Skipped("no admin ssh key configured".to_string()));
        };
        io::ensure_dir_with_mode(&self.ssh_dir, 0o700)?;
        let path = self.authorized_keys();
        let line = format!("{} {}", key.trim(), self.key_id);
        let appended = io::append_line_unless_marked(&path, &line, &self.key_id)?;
        io::set_mode(&path, 0o600)?;
        if !appended {
            return Ok(StepOutcome::Skipped(format!(
                "key '{}' already present",
                self.key_id
            )));
        }
        ctx.log
            .info(&format!("  added key '{}' to {}", self.key_id, path.display()))?;
        Ok(StepOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// EnsureAccount
// ---------------------------------------------------------------------------

pub struct EnsureAccount {
    user: String,
    group: String,
}

impl EnsureAccount {
    fn exists_probe(&self) -> CommandSpec {
        CommandSpec::new("id").args(["-u", self.user.as_str()])
    }

    fn create(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("adduser").args([
                "--disabled-password",
                "--gecos",
                "",
                self.user.as_str(),
            ]),
            CommandSpec::new("usermod").args(["-aG", self.group.as_str(), self.user.as_str()]),
        ]
    }
}

impl Step for EnsureAccount {
    fn name(&self) -> &str {
        "create system account"
    }

    fn plan(&self) -> Vec<String> {
        std::iter::once(self.exists_probe())
            .chain(self.create())
            .map(|c| c.display())
            .collect()
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        if ctx.runner.probe(&self.exists_probe())? {
            return Ok(StepOutcome::Skipped(format!(
                "user {} already exists",
                self.user
            )));
        }
        for cmd in self.create() {
            ctx.log.info(&format!("  $ {}", cmd.display()))?;
            ctx.runner.run(&cmd)?;
        }
        Ok(StepOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// GrantSudo
// ---------------------------------------------------------------------------

/// Installs `<sudoers_dir>/<user>` granting passwordless sudo.
///
/// The policy is written to a temp file in the same directory and checked
/// with `visudo -cf` first; it is only moved into place if the check
/// passes. The temp name starts with a dot, which sudo ignores.
pub struct GrantSudo {
    user: String,
    sudoers_dir: PathBuf,
}

impl GrantSudo {
    fn policy(&self) -> String {
        format!("{} ALL=(ALL) NOPASSWD:ALL\n", self.user)
    }

    fn target(&self) -> PathBuf {
        self.sudoers_dir.join(&self.user)
    }
}

impl Step for GrantSudo {
    fn name(&self) -> &str {
        "grant passwordless sudo"
    }

    fn plan(&self) -> Vec<String> {
        vec![
            format!(
                "write {:?} to a temp file in {}",
                self.policy().trim_end(),
                self.sudoers_dir.display()
            ),
            "visudo -cf <temp file>".to_string(),
            format!("install as {} (0440)", self.target().display()),
        ]
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        io::ensure_dir(&self.sudoers_dir)?;
        let mut tmp = NamedTempFile::new_in(&self.sudoers_dir)?;
        tmp.write_all(self.policy().as_bytes())?;
        tmp.flush()?;
        io::set_mode(tmp.path(), 0o440)?;

        let check = CommandSpec::new("visudo")
            .arg("-cf")
            .arg(tmp.path().display().to_string());
        ctx.log.info(&format!("  $ {}", check.display()))?;
        if !ctx.runner.probe(&check)? {
            // Dropping `tmp` removes the rejected policy.
            return Err(ProvisionError::InvalidSudoPolicy {
                user: self.user.clone(),
            });
        }

        let target = self.target();
        tmp.persist(&target).map_err(|e| e.error)?;
        ctx.log.info(&format!("  installed {}", target.display()))?;
        Ok(StepOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn install_packages(profile: &Profile) -> CommandStep {
    let update = CommandSpec::new("apt-get")
        .arg("update")
        .env("DEBIAN_FRONTEND", "noninteractive");
    let install = CommandSpec::new("apt-get")
        .args(["install", "-y"])
        .args(profile.system.packages.iter().cloned())
        .env("DEBIAN_FRONTEND", "noninteractive");
    CommandStep::new("install system packages", vec![update, install])
}

/// Root-phase steps, in order.
pub fn pipeline(user: &AccountName, profile: &Profile) -> Pipeline {
    let sys = &profile.system;
    let mut p = Pipeline::new();
    p.push(EnsureAuthorizedKey {
        ssh_dir: sys.root_ssh_dir.clone(),
        key: sys.admin_ssh_key.clone(),
        key_id: sys.admin_key_id.clone(),
    });
    p.push(EnsureAccount {
        user: user.to_string(),
        group: sys.sudo_group.clone(),
    });
    p.push(GrantSudo {
        user: user.to_string(),
        sudoers_dir: sys.sudoers_dir.clone(),
    });
    p.push(install_packages(profile));
    p
}

/// Run the root phase. Fails before touching anything unless running as root.
pub fn run(
    user: &AccountName,
    profile: &Profile,
    identity: &dyn IdentityProbe,
    runner: &mut dyn CommandRunner,
    log: &mut dyn ExecLog,
) -> Result<()> {
    require_superuser(identity)?;
    log.info(&format!("root phase: preparing account {user}"))?;
    pipeline(user, profile).run(runner, log)?;
    log.info("root phase complete")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
