mod cmd;
mod output;

use clap::{Args, Parser, Subcommand};
use cmd::{config::ConfigSubcommand, Globals};
use provision_core::params::RawParams;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "frappe-provision",
    about = "Provision a Frappe/ERPNext server: root phase, then user phase as the target account",
    version,
    propagate_version = true
)]
struct Cli {
    /// Provisioning profile (YAML). Built-in defaults when omitted.
    #[arg(long, global = true, env = "FRAPPE_PROVISION_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the per-phase log files (overrides the profile)
    #[arg(long, global = true, env = "FRAPPE_PROVISION_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Output as JSON (plan, config)
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The four invocation parameters. Presence is checked after parsing so a
/// missing value is logged like every other failure.
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Target system account
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Database root password, handed to site creation
    #[arg(short = 'p', long = "db-password")]
    db_password: Option<String>,

    /// Site identifier, e.g. apps.localhost
    #[arg(short = 's', long)]
    site: Option<String>,

    /// Administrator password for the new site
    #[arg(short = 'a', long = "admin-password")]
    admin_password: Option<String>,
}

impl From<ParamArgs> for RawParams {
    fn from(a: ParamArgs) -> Self {
        RawParams {
            user: a.user,
            db_password: a.db_password,
            site: a.site,
            admin_password: a.admin_password,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run both phases: root phase here, then user phase as --user (requires root)
    Run {
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Prepare the OS and the target account (requires root)
    RootPhase {
        /// Target system account
        #[arg(short = 'u', long)]
        user: Option<String>,
    },

    /// Install runtimes, bench, the site, apps and migrations (run as --user)
    UserPhase {
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Print every step both phases would run, without running anything
    Plan {
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Inspect, validate or write a provisioning profile
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and succeed; every usage error exits 1.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let globals = Globals {
        config: cli.config,
        log_dir: cli.log_dir,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Run { params } => cmd::run::run(&globals, params.into()),
        Commands::RootPhase { user } => cmd::root_phase::run(&globals, user),
        Commands::UserPhase { params } => cmd::user_phase::run(&globals, params.into()),
        Commands::Plan { params } => cmd::plan::run(&globals, params.into()),
        Commands::Config { subcommand } => cmd::config::run(&globals, subcommand),
    };

    if let Err(e) = result {
        // Phase failures were already written to the console and the log.
        if !e.is::<cmd::Reported>() {
            eprintln!("ERROR: {e:#}");
        }
        std::process::exit(1);
    }
}
