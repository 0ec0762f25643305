//! Ordered, resumable step execution.
//!
//! Each step passes through `Pending`, then either `Skipped` (already in the
//! ledger, or not applicable) or `Running` followed by `Completed` / `Failed`.
//! The first failure halts the run; nothing after it is attempted and the
//! ledger keeps exactly what it held before the failing step started.
mod step;

pub use step::{Step, StepAction};

use crate::error::ProvisionError;
use crate::session::ProgressLedger;
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCompleted,
    NotApplicable,
}

/// Per-step state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Skipped(SkipReason),
    Completed,
    Failed,
}

impl StepState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Skipped(SkipReason::AlreadyCompleted) => "skipped (already completed)",
            Self::Skipped(SkipReason::NotApplicable) => "skipped (not applicable)",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Global run state.
#[derive(Debug)]
pub enum RunState {
    InProgress,
    Finished,
    Halted(ProvisionError),
}

#[derive(Debug)]
pub struct RunReport {
    /// Steps that were considered, in declaration order, with their final
    /// state. Steps after a halt are absent.
    pub steps: Vec<(&'static str, StepState)>,
    pub state: RunState,
}

impl RunReport {
    pub fn finished(&self) -> bool {
        matches!(self.state, RunState::Finished)
    }

    #[cfg(test)]
    pub fn state_of(&self, id: &str) -> Option<StepState> {
        self.steps
            .iter()
            .find(|(step, _)| *step == id)
            .map(|(_, state)| *state)
    }

    /// The failure that halted the run, if any.
    pub fn halt(&self) -> Option<&ProvisionError> {
        match &self.state {
            RunState::Halted(err) => Some(err),
            _ => None,
        }
    }
}

/// Drives a fixed sequence of steps against a ledger.
#[derive(Debug, Default)]
pub struct StepRunner;

impl StepRunner {
    /// Run every step once, in order. `Err` is reserved for defects in the
    /// step table itself; step failures come back as `RunState::Halted`.
    pub fn run<C: ?Sized>(
        &self,
        steps: &[Step<C>],
        ctx: &mut C,
        ledger: &mut ProgressLedger,
    ) -> Result<RunReport> {
        let mut seen = BTreeSet::new();
        for step in steps {
            if !seen.insert(step.id()) {
                return Err(anyhow!("step `{}` is declared twice", step.id()));
            }
        }

        let mut report = RunReport {
            steps: Vec::with_capacity(steps.len()),
            state: RunState::InProgress,
        };
        for step in steps {
            let state = self.run_step(step, ctx, ledger);
            match state {
                Ok(state) => report.steps.push((step.id(), state)),
                Err(err) => {
                    report.steps.push((step.id(), StepState::Failed));
                    tracing::error!(step = step.id(), error = %err, "run halted");
                    report.state = RunState::Halted(err);
                    return Ok(report);
                }
            }
        }
        report.state = RunState::Finished;
        tracing::info!(steps = report.steps.len(), "run finished");
        Ok(report)
    }

    fn run_step<C: ?Sized>(
        &self,
        step: &Step<C>,
        ctx: &mut C,
        ledger: &mut ProgressLedger,
    ) -> std::result::Result<StepState, ProvisionError> {
        let state = StepState::Pending;
        if !step.applies(ctx) {
            tracing::info!(step = step.id(), "step not applicable, skipping");
            let skipped = StepState::Skipped(SkipReason::NotApplicable);
            return Ok(transition(step.id(), state, skipped));
        }
        if ledger.has_completed(step.id()) {
            tracing::info!(step = step.id(), "step already completed, skipping");
            let skipped = StepState::Skipped(SkipReason::AlreadyCompleted);
            return Ok(transition(step.id(), state, skipped));
        }

        let state = transition(step.id(), state, StepState::Running);
        tracing::info!(step = step.id(), "{}", step.description());
        let start = Instant::now();
        let outcome = step.action().run(ctx).and_then(|()| {
            // Marked immediately: a crash after this must not rerun the step.
            ledger
                .mark_completed(step.id())
                .map_err(|err| err.context("record step completion"))
        });
        match outcome {
            Ok(()) => {
                tracing::info!(
                    step = step.id(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "step completed"
                );
                Ok(transition(step.id(), state, StepState::Completed))
            }
            Err(cause) => {
                transition(step.id(), state, StepState::Failed);
                Err(ProvisionError::StepActionFailed {
                    step: step.id().to_string(),
                    cause,
                })
            }
        }
    }
}

fn transition(step: &str, from: StepState, to: StepState) -> StepState {
    tracing::debug!(step, from = from.label(), to = to.label(), "step state");
    to
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
