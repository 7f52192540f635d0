use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const PROFILE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ProfileWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SystemProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemProfile {
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default = "default_sudo_group")]
    pub sudo_group: String,
    #[serde(default = "default_sudoers_dir")]
    pub sudoers_dir: PathBuf,
    #[serde(default = "default_root_ssh_dir")]
    pub root_ssh_dir: PathBuf,
    /// Comment appended to the admin key; also how an existing entry is recognised.
    #[serde(default = "default_admin_key_id")]
    pub admin_key_id: String,
    /// Public key material (`ssh-ed25519 AAAA…`). Defaults to the built-in
    /// administrative key; an explicit `null` skips key installation.
    #[serde(default = "default_admin_ssh_key")]
    pub admin_ssh_key: Option<String>,
}

fn default_packages() -> Vec<String> {
    [
        "git",
        "redis-server",
        "mariadb-server",
        "mariadb-client",
        "libmariadb-dev",
        "pkg-config",
        "build-essential",
        "xvfb",
        "libfontconfig",
        "wkhtmltopdf",
        "curl",
        "software-properties-common",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sudo_group() -> String {
    "sudo".to_string()
}

fn default_sudoers_dir() -> PathBuf {
    PathBuf::from("/etc/sudoers.d")
}

fn default_root_ssh_dir() -> PathBuf {
    PathBuf::from("/root/.ssh")
}

/// Fixed administrative key installed for root when the profile does not
/// name one.
pub const BUILTIN_ADMIN_SSH_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIO9C/Oq3WGpG2g5gmcG7/QuRaL4tEkmQQHpPo6k2lLjO";

fn default_admin_ssh_key() -> Option<String> {
    Some(BUILTIN_ADMIN_SSH_KEY.to_string())
}

fn default_admin_key_id() -> String {
    "frappe-provision-admin".to_string()
}

impl Default for SystemProfile {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            sudo_group: default_sudo_group(),
            sudoers_dir: default_sudoers_dir(),
            root_ssh_dir: default_root_ssh_dir(),
            admin_key_id: default_admin_key_id(),
            admin_ssh_key: default_admin_ssh_key(),
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeProfile {
    #[serde(default = "default_nvm_version")]
    pub nvm_version: String,
    #[serde(default = "default_node_version")]
    pub node_version: String,
    #[serde(default = "default_uv_installer_url")]
    pub uv_installer_url: String,
    #[serde(default = "default_python_version")]
    pub python_version: String,
}

fn default_nvm_version() -> String {
    "v0.40.1".to_string()
}

fn default_node_version() -> String {
    "18".to_string()
}

fn default_uv_installer_url() -> String {
    "https://astral.sh/uv/install.sh".to_string()
}

fn default_python_version() -> String {
    "3.10".to_string()
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        Self {
            nvm_version: default_nvm_version(),
            node_version: default_node_version(),
            uv_installer_url: default_uv_installer_url(),
            python_version: default_python_version(),
        }
    }
}

impl RuntimeProfile {
    pub fn nvm_installer_url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/nvm-sh/nvm/{}/install.sh",
            self.nvm_version
        )
    }
}

// ---------------------------------------------------------------------------
// BenchProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSource {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchProfile {
    #[serde(default = "default_bench_version")]
    pub version: String,
    /// Workspace directory, relative to the target account's home.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_frappe_branch")]
    pub frappe_branch: String,
    /// Fetched and installed in this order.
    #[serde(default = "default_apps")]
    pub apps: Vec<AppSource>,
    /// Extra libraries pip-installed into the workspace's `env`.
    #[serde(default = "default_python_packages")]
    pub python_packages: Vec<String>,
    /// Dotted paths passed to `bench --site <site> execute`, in order.
    #[serde(default = "default_migrations")]
    pub migrations: Vec<String>,
    #[serde(default = "default_developer_mode")]
    pub developer_mode: bool,
}

fn default_bench_version() -> String {
    "5.22.6".to_string()
}

fn default_workspace() -> String {
    "frappe-bench".to_string()
}

fn default_frappe_branch() -> String {
    "version-15".to_string()
}

fn default_apps() -> Vec<AppSource> {
    vec![
        AppSource {
            name: "erpnext".to_string(),
            url: "https://github.com/frappe/erpnext".to_string(),
            branch: Some("version-15".to_string()),
        },
        AppSource {
            name: "hrms".to_string(),
            url: "https://github.com/frappe/hrms".to_string(),
            branch: Some("version-15".to_string()),
        },
    ]
}

fn default_python_packages() -> Vec<String> {
    vec!["pandas".to_string()]
}

fn default_migrations() -> Vec<String> {
    [
        "erpnext.setup.install.create_print_setting_custom_fields",
        "erpnext.setup.install.create_default_success_action",
        "erpnext.setup.install.set_single_defaults",
        "erpnext.setup.install.add_standard_navbar_items",
        "hrms.setup.create_custom_fields",
        "hrms.setup.create_salary_slip_loan_fields",
        "hrms.setup.add_non_standard_user_types",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_developer_mode() -> bool {
    true
}

impl Default for BenchProfile {
    fn default() -> Self {
        Self {
            version: default_bench_version(),
            workspace: default_workspace(),
            frappe_branch: default_frappe_branch(),
            apps: default_apps(),
            python_packages: default_python_packages(),
            migrations: default_migrations(),
            developer_mode: default_developer_mode(),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub system: SystemProfile,
    #[serde(default)]
    pub runtime: RuntimeProfile,
    #[serde(default)]
    pub bench: BenchProfile,
}

fn default_version() -> u32 {
    PROFILE_VERSION
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_dir: default_log_dir(),
            system: SystemProfile::default(),
            runtime: RuntimeProfile::default(),
            bench: BenchProfile::default(),
        }
    }
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::InvalidProfile(format!("cannot read {}: {e}", path.display()))
        })?;
        let profile: Profile = serde_yaml::from_str(&data)?;
        Ok(profile)
    }

    /// Load `path` if given, otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Fails with `InvalidProfile` if `validate` reports any error.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::InvalidProfile(errors.join("; ")))
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ProfileWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ProfileWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.version != PROFILE_VERSION {
            error(format!(
                "unsupported profile version {} (expected {PROFILE_VERSION})",
                self.version
            ));
        }
        if self.system.packages.is_empty() {
            error("system.packages is empty".to_string());
        }
        if self.bench.workspace.trim().is_empty() || self.bench.workspace.contains('/') {
            error(format!(
                "bench.workspace '{}' must be a single directory name",
                self.bench.workspace
            ));
        }
        if self.bench.apps.is_empty() {
            error("bench.apps is empty".to_string());
        }
        for app in &self.bench.apps {
            if app.url.trim().is_empty() {
                error(format!("app '{}' has no url", app.name));
            }
        }

        let mut seen = HashSet::new();
        for m in &self.bench.migrations {
            if !seen.insert(m.as_str()) {
                error(format!("migration '{m}' is listed more than once"));
            }
        }

        if self.bench.migrations.is_empty() {
            warnings.push(ProfileWarning {
                level: WarnLevel::Warning,
                message: "bench.migrations is empty; no migrations will run".to_string(),
            });
        }
        match self.system.admin_ssh_key.as_deref() {
            None => warnings.push(ProfileWarning {
                level: WarnLevel::Warning,
                message: "system.admin_ssh_key is null; admin key installation will be skipped"
                    .to_string(),
            }),
            Some(key) if key.trim() == BUILTIN_ADMIN_SSH_KEY => warnings.push(ProfileWarning {
                level: WarnLevel::Warning,
                message: "system.admin_ssh_key is the built-in key and grants root ssh access; \
                          set your own administrative key"
                    .to_string(),
            }),
            Some(key) if key.split_whitespace().count() < 2 => warnings.push(ProfileWarning {
                level: WarnLevel::Error,
                message: "system.admin_ssh_key must be '<type> <base64 key>'".to_string(),
            }),
            Some(_) => {}
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
