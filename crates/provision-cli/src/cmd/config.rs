use super::Globals;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use provision_core::profile::{Profile, WarnLevel};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective profile (defaults merged with --config)
    Show,

    /// Check the profile for mistakes
    Validate,

    /// Write the built-in default profile to a file
    Init {
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(globals: &Globals, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(globals),
        ConfigSubcommand::Validate => validate(globals),
        ConfigSubcommand::Init { path, force } => init(&path, force),
    }
}

fn load(globals: &Globals) -> anyhow::Result<Profile> {
    Profile::load_or_default(globals.config.as_deref()).context("failed to load profile")
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(globals: &Globals) -> anyhow::Result<()> {
    let profile = load(globals)?;
    if globals.json {
        return print_json(&profile);
    }
    print!("{}", serde_yaml::to_string(&profile)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(globals: &Globals) -> anyhow::Result<()> {
    let profile = load(globals)?;
    let warnings = profile.validate();

    if globals.json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Profile is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("profile validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Profile::default()
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default profile to {}", path.display());
    Ok(())
}
