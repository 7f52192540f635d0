pub mod config;
pub mod plan;
pub mod root_phase;
pub mod run;
pub mod user_phase;

use provision_core::log::{ExecLog, FileLog, Phase};
use provision_core::paths;
use provision_core::profile::Profile;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Flags shared by every subcommand.
pub struct Globals {
    pub config: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub json: bool,
}

impl Globals {
    pub fn load_profile(&self) -> provision_core::Result<Profile> {
        let profile = Profile::load_or_default(self.config.as_deref())?;
        profile.ensure_valid()?;
        Ok(profile)
    }

    pub fn log_dir(&self, profile: &Profile) -> PathBuf {
        paths::log_dir(profile, self.log_dir.as_deref())
    }
}

/// Marker for a failure that has already been logged as `ERROR:`.
#[derive(Debug, Error)]
#[error("provisioning failed (see log)")]
pub struct Reported;

/// Load the profile and run `body` under today's log for `phase`.
///
/// Any failure, including an unreadable or invalid profile, is written to
/// the log (and console) once, then surfaced as [`Reported`]. Without a
/// usable profile the log goes to `--log-dir` or the default directory.
pub fn run_phase<F>(globals: &Globals, phase: Phase, body: F) -> anyhow::Result<()>
where
    F: FnOnce(&Profile, &Path, &mut FileLog) -> provision_core::Result<()>,
{
    let loaded = globals.load_profile();
    let dir = match &loaded {
        Ok(profile) => globals.log_dir(profile),
        Err(_) => globals.log_dir(&Profile::default()),
    };
    let mut log = FileLog::new(&dir, phase);
    match loaded.and_then(|profile| body(&profile, &dir, &mut log)) {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(log_err) = log.error(&e.to_string()) {
                tracing::warn!(error = %log_err, "could not write to {}", log.path().display());
                eprintln!("ERROR: {e}");
            }
            Err(Reported.into())
        }
    }
}
