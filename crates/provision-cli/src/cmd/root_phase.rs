use super::{run_phase, Globals};
use provision_core::identity::SystemIdentity;
use provision_core::log::Phase;
use provision_core::params::AccountName;
use provision_core::root_phase;
use provision_core::runner::SystemRunner;

pub fn run(globals: &Globals, user: Option<String>) -> anyhow::Result<()> {
    run_phase(globals, Phase::Root, |profile, _dir, log| {
        let user = AccountName::parse(user.as_deref())?;
        root_phase::run(&user, profile, &SystemIdentity, &mut SystemRunner::new(), log)
    })
}
