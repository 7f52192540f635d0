use crate::error::{ProvisionError, Result};
use crate::profile::Profile;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const NVM_DIR: &str = ".nvm";
pub const LOCAL_BIN_DIR: &str = ".local/bin";
pub const WORKSPACE_ENV_PIP: &str = "env/bin/pip";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Home directory of the current process (honours `HOME`).
pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(ProvisionError::HomeNotFound)
}

pub fn workspace_dir(home: &Path, profile: &Profile) -> PathBuf {
    home.join(&profile.bench.workspace)
}

pub fn workspace_pip(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_ENV_PIP)
}

/// Log directory: explicit override, else the profile's.
pub fn log_dir(profile: &Profile, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| profile.log_dir.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_lives_under_home() {
        let p = Profile::default();
        assert_eq!(
            workspace_dir(Path::new("/home/svc"), &p),
            PathBuf::from("/home/svc/frappe-bench")
        );
        assert_eq!(
            workspace_pip(Path::new("/home/svc/frappe-bench")),
            PathBuf::from("/home/svc/frappe-bench/env/bin/pip")
        );
    }

    #[test]
    fn explicit_log_dir_wins() {
        let p = Profile::default();
        assert_eq!(log_dir(&p, None), PathBuf::from("/tmp"));
        assert_eq!(
            log_dir(&p, Some(Path::new("/var/log/fp"))),
            PathBuf::from("/var/log/fp")
        );
    }
}
