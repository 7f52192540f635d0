//! Fail-fast step pipeline.
//!
//! A phase is an ordered list of [`Step`]s. [`Pipeline::run`] executes them
//! in order and stops at the first error, wrapping it in
//! `ProvisionError::StepFailed` with the step's 1-based position and name.
//! Nothing after a failed step runs; nothing before it is undone.

use serde::Serialize;

use crate::error::{ProvisionError, Result};
use crate::log::ExecLog;
use crate::runner::{CommandRunner, CommandSpec};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped(String),
}

pub struct StepContext<'a> {
    pub runner: &'a mut dyn CommandRunner,
    pub log: &'a mut dyn ExecLog,
}

pub trait Step {
    fn name(&self) -> &str;

    /// Commands this step would run (or a description of what it would
    /// change), with secrets masked.
    fn plan(&self) -> Vec<String>;

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome>;
}

/// A named sequence of external commands, run in order.
pub struct CommandStep {
    name: String,
    commands: Vec<CommandSpec>,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, commands: Vec<CommandSpec>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn single(name: impl Into<String>, command: CommandSpec) -> Self {
        Self::new(name, vec![command])
    }
}

impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn plan(&self) -> Vec<String> {
        self.commands.iter().map(CommandSpec::display).collect()
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        for cmd in &self.commands {
            ctx.log.info(&format!("  $ {}", cmd.display()))?;
            ctx.runner.run(cmd)?;
        }
        Ok(StepOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// StepPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StepPlan {
    pub index: usize,
    pub name: String,
    pub commands: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Step + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn plan(&self) -> Vec<StepPlan> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepPlan {
                index: i + 1,
                name: s.name().to_string(),
                commands: s.plan(),
            })
            .collect()
    }

    pub fn run(&self, runner: &mut dyn CommandRunner, log: &mut dyn ExecLog) -> Result<()> {
        let total = self.steps.len();
        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            log.info(&format!("[{index}/{total}] {}", step.name()))?;
            let mut ctx = StepContext {
                runner: &mut *runner,
                log: &mut *log,
            };
            match step.run(&mut ctx) {
                Ok(StepOutcome::Done) => log.info(&format!("[{index}/{total}] done"))?,
                Ok(StepOutcome::Skipped(reason)) => {
                    log.info(&format!("[{index}/{total}] skipped: {reason}"))?
                }
                Err(e) => {
                    return Err(ProvisionError::StepFailed {
                        index,
                        step: step.name().to_string(),
                        source: Box::new(e),
                    })
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
