//! Invocation parameters threaded through every phase.
//!
//! Parameters arrive as optional strings from the command line and are
//! checked here before any phase does anything with side effects. An
//! empty value is treated the same as an absent one.

use crate::error::{ProvisionError, Result};
use crate::runner::CommandSpec;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Flag names (used in diagnostics and when re-serializing for hand-off)
// ---------------------------------------------------------------------------

pub const USER_FLAG: &str = "--user";
pub const DB_PASSWORD_FLAG: &str = "--db-password";
pub const SITE_FLAG: &str = "--site";
pub const ADMIN_PASSWORD_FLAG: &str = "--admin-password";

const MASK: &str = "********";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

// ---------------------------------------------------------------------------
// AccountName / SiteName
// ---------------------------------------------------------------------------

static ACCOUNT_RE: OnceLock<Regex> = OnceLock::new();
static SITE_RE: OnceLock<Regex> = OnceLock::new();

fn account_re() -> &'static Regex {
    ACCOUNT_RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_-]*$").expect("static regex"))
}

fn site_re() -> &'static Regex {
    SITE_RE.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9.\-]*[a-z0-9])?$").expect("static regex"))
}

/// A POSIX-style login name for the target system account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountName(String);

impl AccountName {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let value = required(raw, USER_FLAG)?;
        if value.len() > 32 || !account_re().is_match(value) {
            return Err(ProvisionError::InvalidArgument {
                field: "user",
                value: value.to_string(),
                reason: "must be a lowercase login name of at most 32 characters",
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Frappe site identifier, e.g. `apps.localhost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteName(String);

impl SiteName {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let value = required(raw, SITE_FLAG)?;
        if value.len() > 253 || !site_re().is_match(value) {
            return Err(ProvisionError::InvalidArgument {
                field: "site",
                value: value.to_string(),
                reason: "must be a lowercase host name",
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn required<'a>(raw: Option<&'a str>, flag: &'static str) -> Result<&'a str> {
    match raw {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ProvisionError::MissingArgument(flag)),
    }
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Unvalidated parameters as they come off the command line.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    pub user: Option<String>,
    pub db_password: Option<String>,
    pub site: Option<String>,
    pub admin_password: Option<String>,
}

/// The four validated invocation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub user: AccountName,
    pub db_password: Secret,
    pub site: SiteName,
    pub admin_password: Secret,
}

impl Params {
    /// Validate in flag order; the first missing or malformed value wins.
    pub fn from_raw(raw: &RawParams) -> Result<Self> {
        let user = AccountName::parse(raw.user.as_deref())?;
        let db_password = Secret::new(required(raw.db_password.as_deref(), DB_PASSWORD_FLAG)?);
        let site = SiteName::parse(raw.site.as_deref())?;
        let admin_password = Secret::new(required(
            raw.admin_password.as_deref(),
            ADMIN_PASSWORD_FLAG,
        )?);
        Ok(Self {
            user,
            db_password,
            site,
            admin_password,
        })
    }

    /// Append the four flags to `spec` for the user-phase hand-off. Both
    /// passwords go in as secret arguments.
    pub fn append_to(&self, spec: CommandSpec) -> CommandSpec {
        spec.arg(USER_FLAG)
            .arg(self.user.as_str())
            .arg(DB_PASSWORD_FLAG)
            .secret_arg(self.db_password.expose())
            .arg(SITE_FLAG)
            .arg(self.site.as_str())
            .arg(ADMIN_PASSWORD_FLAG)
            .secret_arg(self.admin_password.expose())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
