//! Who is running this process, and where a given account lives.

use std::path::PathBuf;

use nix::unistd::{geteuid, User};

use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: u32,
    pub name: String,
}

impl Principal {
    pub fn new(uid: u32, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
        }
    }

    pub fn root() -> Self {
        Self::new(0, "root")
    }

    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }
}

pub trait IdentityProbe {
    /// The effective identity of the current process.
    fn effective(&self) -> Result<Principal>;

    /// Home directory for `account`.
    fn home_of(&self, account: &str) -> Result<PathBuf>;
}

/// Fails with `NotSuperuser` unless the effective identity is root.
pub fn require_superuser(probe: &dyn IdentityProbe) -> Result<Principal> {
    let me = probe.effective()?;
    if !me.is_superuser() {
        return Err(ProvisionError::NotSuperuser(me.name));
    }
    Ok(me)
}

/// Fails with `IdentityMismatch` unless the effective login name is `expected`.
pub fn require_account(probe: &dyn IdentityProbe, expected: &str) -> Result<Principal> {
    let me = probe.effective()?;
    if me.name != expected {
        return Err(ProvisionError::IdentityMismatch {
            expected: expected.to_string(),
            actual: me.name,
        });
    }
    Ok(me)
}

fn default_home(account: &str) -> PathBuf {
    PathBuf::from("/home").join(account)
}

// ---------------------------------------------------------------------------
// SystemIdentity
// ---------------------------------------------------------------------------

/// Reads the real process identity and the system user database.
#[derive(Debug, Default)]
pub struct SystemIdentity;

impl IdentityProbe for SystemIdentity {
    fn effective(&self) -> Result<Principal> {
        let uid = geteuid();
        let user = User::from_uid(uid)
            .map_err(|e| ProvisionError::UserLookup(e.to_string()))?
            .ok_or_else(|| ProvisionError::UserLookup(format!("no passwd entry for uid {uid}")))?;
        Ok(Principal::new(uid.as_raw(), user.name))
    }

    fn home_of(&self, account: &str) -> Result<PathBuf> {
        let user = User::from_name(account).map_err(|e| ProvisionError::UserLookup(e.to_string()))?;
        Ok(user.map(|u| u.dir).unwrap_or_else(|| default_home(account)))
    }
}

// ---------------------------------------------------------------------------
// FixedIdentity
// ---------------------------------------------------------------------------

/// A preset identity; homes are always `/home/<name>`.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub Principal);

impl IdentityProbe for FixedIdentity {
    fn effective(&self) -> Result<Principal> {
        Ok(self.0.clone())
    }

    fn home_of(&self, account: &str) -> Result<PathBuf> {
        Ok(default_home(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_check() {
        let root = FixedIdentity(Principal::root());
        assert!(require_superuser(&root).is_ok());

        let svc = FixedIdentity(Principal::new(1001, "svc"));
        match require_superuser(&svc) {
            Err(ProvisionError::NotSuperuser(name)) => assert_eq!(name, "svc"),
            other => panic!("expected NotSuperuser, got {other:?}"),
        }
    }

    #[test]
    fn account_check_compares_login_names() {
        let svc = FixedIdentity(Principal::new(1001, "svc"));
        assert!(require_account(&svc, "svc").is_ok());
        assert!(matches!(
            require_account(&svc, "other"),
            Err(ProvisionError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn root_is_not_the_target_account() {
        let root = FixedIdentity(Principal::root());
        assert!(require_account(&root, "svc").is_err());
    }

    #[test]
    fn unknown_account_home_falls_back_to_home_dir() {
        let home = SystemIdentity.home_of("no-such-account-7c1e").unwrap();
        assert_eq!(home, PathBuf::from("/home/no-such-account-7c1e"));
    }
}
