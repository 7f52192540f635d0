use super::{run_phase, Globals};
use provision_core::identity::SystemIdentity;
use provision_core::log::{FileLog, Phase};
use provision_core::orchestrator::{self, Handoff};
use provision_core::params::{Params, RawParams};
use provision_core::runner::SystemRunner;

/// The user phase starts in the target's home, so forwarded paths must be absolute.
fn handoff(globals: &Globals) -> provision_core::Result<Handoff> {
    let mut handoff = Handoff::new(std::env::current_exe()?);
    if let Some(config) = &globals.config {
        let abs = std::fs::canonicalize(config)?;
        handoff = handoff.global_arg("--config", abs.display().to_string());
    }
    if let Some(log_dir) = &globals.log_dir {
        let abs = std::path::absolute(log_dir)?;
        handoff = handoff.global_arg("--log-dir", abs.display().to_string());
    }
    Ok(handoff)
}

pub fn run(globals: &Globals, raw: RawParams) -> anyhow::Result<()> {
    run_phase(globals, Phase::Orchestrator, |profile, dir, log| {
        let params = Params::from_raw(&raw)?;
        let handoff = handoff(globals)?;
        // Created on first write, after the superuser check.
        let mut root_log = FileLog::new(dir, Phase::Root);
        orchestrator::run(
            &params,
            profile,
            &handoff,
            &SystemIdentity,
            &mut SystemRunner::new(),
            log,
            &mut root_log,
        )
    })
}
