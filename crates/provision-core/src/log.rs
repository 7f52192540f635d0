//! Execution log: one append-only, timestamped file per phase per day.
//!
//! This is separate from `tracing`. The execution log is the operator's
//! record of what a provisioning run did; every record is also emitted as
//! a `tracing` event so `RUST_LOG` still sees it.

use crate::error::Result;
use chrono::{Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Level / Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Which component a log file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Orchestrator,
    Root,
    User,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Orchestrator => "orchestrator",
            Phase::Root => "root",
            Phase::User => "user",
        }
    }
}

/// `<dir>/frappe-provision-<phase>-<YYYYMMDD>.log`
pub fn log_file_path(dir: &Path, phase: Phase, day: NaiveDate) -> PathBuf {
    dir.join(format!(
        "frappe-provision-{}-{}.log",
        phase.as_str(),
        day.format("%Y%m%d")
    ))
}

// ---------------------------------------------------------------------------
// ExecLog
// ---------------------------------------------------------------------------

pub trait ExecLog {
    fn record(&mut self, level: Level, message: &str) -> Result<()>;

    fn info(&mut self, message: &str) -> Result<()> {
        self.record(Level::Info, message)
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        self.record(Level::Warn, message)
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.record(Level::Error, message)
    }
}

fn format_line(level: Level, message: &str) -> String {
    let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
    match level {
        // Errors carry the ERROR: prefix on the message itself so the line
        // greps the same on the console and in the file.
        Level::Error => format!("[{ts}] ERROR: {message}"),
        other => format!("[{ts}] {} {message}", other.as_str()),
    }
}

fn emit_tracing(level: Level, message: &str) {
    match level {
        Level::Info => tracing::info!("{message}"),
        Level::Warn => tracing::warn!("{message}"),
        Level::Error => tracing::error!("{message}"),
    }
}

// ---------------------------------------------------------------------------
// FileLog
// ---------------------------------------------------------------------------

/// Appends to the phase's log file and echoes every line to stderr.
///
/// Nothing touches the filesystem until the first record, so a phase that
/// is refused before it logs anything leaves no file behind.
pub struct FileLog {
    dir: PathBuf,
    path: PathBuf,
    file: Option<File>,
    echo: bool,
}

impl FileLog {
    /// Today's log for `phase` in `dir`.
    pub fn new(dir: &Path, phase: Phase) -> Self {
        Self::for_day(dir, phase, Local::now().date_naive())
    }

    pub fn for_day(dir: &Path, phase: Phase, day: NaiveDate) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: log_file_path(dir, phase, day),
            file: None,
            echo: true,
        }
    }

    /// Stop echoing to stderr (file only).
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(f) => f,
            None => {
                crate::io::ensure_dir(&self.dir)?;
                open_append(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }
}

/// Reopen an existing file without `O_CREAT`: with `fs.protected_regular`
/// the kernel refuses `O_CREAT` on another user's file in a sticky `/tmp`.
fn open_append(path: &Path) -> std::io::Result<File> {
    match OpenOptions::new().append(true).open(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            OpenOptions::new().create(true).append(true).open(path)
        }
        other => other,
    }
}

impl ExecLog for FileLog {
    fn record(&mut self, level: Level, message: &str) -> Result<()> {
        let line = format_line(level, message);
        writeln!(self.file()?, "{line}")?;
        if self.echo {
            // Already on the console; keep tracing below the default filter.
            eprintln!("{line}");
            tracing::debug!("{message}");
        } else {
            emit_tracing(level, message);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryLog
// ---------------------------------------------------------------------------

/// Keeps records in memory. Used by tests and by `plan`.
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub records: Vec<(Level, String)>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.records.iter().map(|(_, m)| m.as_str()).collect()
    }

    /// Index of the first record containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.records.iter().position(|(_, m)| m.contains(needle))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }
}

impl ExecLog for MemoryLog {
    fn record(&mut self, level: Level, message: &str) -> Result<()> {
        self.records.push((level, message.to_string()));
        emit_tracing(level, message);
        Ok(())
    }
}
