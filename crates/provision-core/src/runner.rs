//! External command invocation.
//!
//! Every side effect on the host (package manager, user database, bench)
//! goes through a [`CommandRunner`], so phases can be driven against a
//! [`RecordingRunner`] without touching the machine.
//!
//! # Identity switching
//! A [`CommandSpec`] may carry a [`RunAs`]. The system runner renders it as
//! `sudo -u <user> env HOME=<home> [VAR=value…] <program> <args…>` and runs
//! it from the target's home directory unless an explicit `cwd` is set.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{ProvisionError, Result};

const MASK: &str = "********";

// ---------------------------------------------------------------------------
// RunAs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    pub user: String,
    pub home: PathBuf,
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub run_as: Option<RunAs>,
    /// Shell-safe replacement text for individual `args` entries in `display()`.
    shown: Vec<(usize, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            run_as: None,
            shown: Vec::new(),
        }
    }

    /// `bash -lc <script>`, for tools that only exist as shell functions
    /// or behind a sourced environment (nvm, the uv installer).
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-lc").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// An argument that is passed as-is but always displayed as `********`.
    pub fn secret_arg(mut self, value: impl Into<String>) -> Self {
        self.shown.push((self.args.len(), MASK.to_string()));
        self.args.push(value.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn run_as(mut self, run_as: RunAs) -> Self {
        self.run_as = Some(run_as);
        self
    }

    fn prefix(&self) -> Vec<String> {
        let mut prefix = Vec::new();
        if let Some(ra) = &self.run_as {
            prefix.extend([
                "sudo".to_string(),
                "-u".to_string(),
                ra.user.clone(),
                "env".to_string(),
                format!("HOME={}", ra.home.display()),
            ]);
            prefix.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
        }
        prefix
    }

    /// Full argument vector as it is handed to the OS, secrets included.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.prefix();
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Shell-like rendering for logs and plans, with secret arguments masked.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(dir) = &self.cwd {
            parts.push(format!("cd {} &&", quote(&dir.display().to_string())));
        }
        if self.run_as.is_none() {
            parts.extend(self.env.iter().map(|(k, v)| format!("{k}={}", quote(v))));
        }
        parts.extend(self.prefix().iter().map(|a| quote(a)));
        parts.push(quote(&self.program));
        for (i, arg) in self.args.iter().enumerate() {
            match self.shown.iter().find(|(j, _)| *j == i) {
                Some((_, text)) => parts.push(text.clone()),
                None => parts.push(quote(arg)),
            }
        }
        parts.join(" ")
    }

    fn working_dir(&self) -> Option<&Path> {
        self.cwd
            .as_deref()
            .or_else(|| self.run_as.as_ref().map(|ra| ra.home.as_path()))
    }
}

// ---------------------------------------------------------------------------
// ShellScript
// ---------------------------------------------------------------------------

/// A `bash -lc` command line assembled word by word, so secret words can be
/// masked before the script is quoted for display.
#[derive(Debug, Clone, Default)]
pub struct ShellScript {
    prelude: Option<String>,
    words: Vec<(String, bool)>,
}

impl ShellScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shell text run before the command words, e.g. sourcing an environment.
    pub fn prelude(mut self, prelude: impl Into<String>) -> Self {
        self.prelude = Some(prelude.into());
        self
    }

    pub fn word(mut self, word: impl Into<String>) -> Self {
        self.words.push((word.into(), false));
        self
    }

    pub fn words(mut self, words: &[&str]) -> Self {
        self.words.extend(words.iter().map(|w| (w.to_string(), false)));
        self
    }

    pub fn secret(mut self, word: impl Into<String>) -> Self {
        self.words.push((word.into(), true));
        self
    }

    fn render(&self, masked: bool) -> String {
        let line: Vec<String> = self
            .words
            .iter()
            .map(|(w, secret)| {
                if masked && *secret {
                    MASK.to_string()
                } else {
                    quote(w)
                }
            })
            .collect();
        match &self.prelude {
            Some(prelude) => format!("{prelude}; {}", line.join(" ")),
            None => line.join(" "),
        }
    }

    pub fn into_command(self) -> CommandSpec {
        let mut spec = CommandSpec::shell(self.render(false));
        if self.words.iter().any(|(_, secret)| *secret) {
            // args[1] is the script after `-lc`.
            spec.shown.push((1, quote(&self.render(true))));
        }
        spec
    }
}

/// Quote `arg` for a POSIX shell; plain words pass through unchanged.
pub fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub trait CommandRunner {
    /// Run to completion. A non-zero exit is `ProvisionError::CommandFailed`.
    fn run(&mut self, spec: &CommandSpec) -> Result<()>;

    /// Run for its exit status only; output is discarded.
    fn probe(&mut self, spec: &CommandSpec) -> Result<bool>;
}

/// Runs commands on the host, blocking until each exits.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, spec: &CommandSpec) -> Result<Command> {
        let argv = spec.argv();
        let program = which::which(&argv[0])
            .map_err(|_| ProvisionError::ToolNotFound(argv[0].clone()))?;

        let mut cmd = Command::new(program);
        cmd.args(&argv[1..]);
        if spec.run_as.is_none() {
            for (k, v) in &spec.env {
                cmd.env(k, v);
            }
        }
        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        Ok(cmd)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<()> {
        tracing::debug!(command = %spec.display(), "running");
        let status = self.build(spec)?.status()?;
        if !status.success() {
            return Err(ProvisionError::CommandFailed {
                command: spec.display(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    fn probe(&mut self, spec: &CommandSpec) -> Result<bool> {
        tracing::debug!(command = %spec.display(), "probing");
        let status = self
            .build(spec)?
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }
}

// ---------------------------------------------------------------------------
// RecordingRunner
// ---------------------------------------------------------------------------

/// Records every command instead of running it.
///
/// Commands succeed unless their joined argv contains the needle given
/// to [`RecordingRunner::fail_when`]. Probes answer `false` unless a
/// matching needle was registered with [`RecordingRunner::probe_returns`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub commands: Vec<CommandSpec>,
    fail_on: Option<String>,
    probe_answers: Vec<(String, bool)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn probe_returns(&mut self, needle: impl Into<String>, answer: bool) {
        self.probe_answers.push((needle.into(), answer));
    }

    /// Display lines of everything recorded so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.commands.iter().map(CommandSpec::display).collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands.iter().any(|c| c.argv().join(" ").contains(needle))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<()> {
        self.commands.push(spec.clone());
        if let Some(needle) = &self.fail_on {
            if spec.argv().join(" ").contains(needle.as_str()) {
                return Err(ProvisionError::CommandFailed {
                    command: spec.display(),
                    status: "exit status: 1".to_string(),
                });
            }
        }
        Ok(())
    }

    fn probe(&mut self, spec: &CommandSpec) -> Result<bool> {
        self.commands.push(spec.clone());
        let line = spec.argv().join(" ");
        Ok(self
            .probe_answers
            .iter()
            .rev()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, answer)| *answer)
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
