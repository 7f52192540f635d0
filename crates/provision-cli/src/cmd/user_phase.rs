use super::{run_phase, Globals};
use provision_core::identity::SystemIdentity;
use provision_core::log::Phase;
use provision_core::params::{Params, RawParams};
use provision_core::runner::SystemRunner;
use provision_core::{paths, user_phase};

pub fn run(globals: &Globals, raw: RawParams) -> anyhow::Result<()> {
    run_phase(globals, Phase::User, |profile, _dir, log| {
        let params = Params::from_raw(&raw)?;
        let home = paths::home_dir()?;
        user_phase::run(
            &params,
            profile,
            &home,
            &SystemIdentity,
            &mut SystemRunner::new(),
            log,
        )
    })
}
