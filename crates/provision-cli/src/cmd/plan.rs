use super::Globals;
use crate::output::{print_json, print_table};
use provision_core::identity::{IdentityProbe, SystemIdentity};
use provision_core::params::{Params, RawParams};
use provision_core::step::StepPlan;
use provision_core::{root_phase, user_phase};

pub fn run(globals: &Globals, raw: RawParams) -> anyhow::Result<()> {
    let profile = globals.load_profile()?;
    let params = Params::from_raw(&raw)?;
    let home = SystemIdentity.home_of(params.user.as_str())?;

    let root = root_phase::pipeline(&params.user, &profile).plan();
    let user = user_phase::pipeline(&params, &profile, &home).plan();

    if globals.json {
        let value = serde_json::json!({
            "user": params.user.as_str(),
            "site": params.site.as_str(),
            "home": home.display().to_string(),
            "root_phase": root,
            "user_phase": user,
        });
        return print_json(&value);
    }

    let mut rows = Vec::new();
    push_rows(&mut rows, "root", &root);
    push_rows(&mut rows, "user", &user);
    print_table(&["PHASE", "#", "STEP", "COMMAND"], &rows);
    Ok(())
}

fn push_rows(rows: &mut Vec<Vec<String>>, phase: &str, steps: &[StepPlan]) {
    for step in steps {
        let mut commands = step.commands.iter();
        let first = commands.next().cloned().unwrap_or_default();
        rows.push(vec![
            phase.to_string(),
            step.index.to_string(),
            step.name.clone(),
            first,
        ]);
        for cmd in commands {
            rows.push(vec![String::new(), String::new(), String::new(), cmd.clone()]);
        }
    }
}
