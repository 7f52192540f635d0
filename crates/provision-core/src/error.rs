use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid {field} '{value}': {reason}")]
    InvalidArgument {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("this command must be run as root (effective user is '{0}')")]
    NotSuperuser(String),

    #[error("this command must be run as '{expected}' (effective user is '{actual}')")]
    IdentityMismatch { expected: String, actual: String },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("command failed ({status}): {command}")]
    CommandFailed { command: String, status: String },

    #[error("step {index} '{step}' failed: {source}")]
    StepFailed {
        index: usize,
        step: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("sudo policy for '{user}' failed validation; nothing was installed")]
    InvalidSudoPolicy { user: String },

    #[error("'{0}' is not executable by other accounts; install frappe-provision in a world-executable location such as /usr/local/bin")]
    ExecutableUnreachable(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error("user lookup failed: {0}")]
    UserLookup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// The innermost error, unwrapping any `StepFailed` layers.
    pub fn root_cause(&self) -> &ProvisionError {
        match self {
            ProvisionError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_names_index_and_step() {
        let err = ProvisionError::StepFailed {
            index: 4,
            step: "create site".to_string(),
            source: Box::new(ProvisionError::CommandFailed {
                command: "bench new-site x".to_string(),
                status: "exit status: 1".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("step 4 'create site' failed"));
        assert!(msg.contains("bench new-site x"));
    }

    #[test]
    fn root_cause_unwraps_nested_steps() {
        let err = ProvisionError::StepFailed {
            index: 1,
            step: "outer".to_string(),
            source: Box::new(ProvisionError::ToolNotFound("bench".to_string())),
        };
        assert!(matches!(err.root_cause(), ProvisionError::ToolNotFound(t) if t == "bench"));
    }
}
