//! Composite sequences.
//!
//! Each step is attempted in order. A step whose in-state does not match is
//! skipped, which lets the same list drive the system from wherever it is. Any
//! other failure stops the sequence and is returned.

use crate::commands::{Command, Sequence};
use crate::engine::RunControl;
use crate::error::RcResult;
use crate::model::{Params, RcEvent, State};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepOutcome {
    Executed,
    /// Precondition not met; `state` is what the step found.
    Skipped { state: State },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceReport {
    pub sequence: Sequence,
    pub steps: Vec<(Command, StepOutcome)>,
    pub final_state: State,
}

impl SequenceReport {
    pub fn executed(&self) -> Vec<Command> {
        self.steps
            .iter()
            .filter(|(_, o)| *o == StepOutcome::Executed)
            .map(|(c, _)| *c)
            .collect()
    }

    /// One line naming the steps that ran and the ones that were skipped.
    pub fn summary(&self) -> String {
        let join = |executed: bool| {
            let names: Vec<&str> = self
                .steps
                .iter()
                .filter(|(_, o)| (*o == StepOutcome::Executed) == executed)
                .map(|(c, _)| c.name())
                .collect();
            if names.is_empty() {
                "-".to_string()
            } else {
                names.join(", ")
            }
        };
        format!(
            "'{}' ran [{}], skipped [{}]",
            self.sequence,
            join(true),
            join(false)
        )
    }
}

pub async fn run_sequence(
    rc: &RunControl,
    sequence: Sequence,
    params: &Params,
) -> RcResult<SequenceReport> {
    rc.events()
        .emit(RcEvent::SequenceStarted {
            sequence,
            from: rc.state(),
        })
        .await;

    let mut steps = Vec::with_capacity(sequence.steps().len());
    for &command in sequence.steps() {
        let outcome = try_execute(rc, sequence, command, params).await?;
        steps.push((command, outcome));
    }

    let final_state = rc.state();
    rc.events()
        .emit(RcEvent::SequenceCompleted {
            sequence,
            state: final_state,
        })
        .await;
    Ok(SequenceReport {
        sequence,
        steps,
        final_state,
    })
}

async fn try_execute(
    rc: &RunControl,
    sequence: Sequence,
    command: Command,
    params: &Params,
) -> RcResult<StepOutcome> {
    match rc.execute_command(command, params).await {
        Ok(()) => Ok(StepOutcome::Executed),
        Err(e) if e.is_precondition() => {
            let state = rc.state();
            rc.events()
                .emit(RcEvent::StepSkipped {
                    sequence,
                    command,
                    state,
                })
                .await;
            Ok(StepOutcome::Skipped { state })
        }
        Err(e) => Err(e),
    }
}

impl RunControl {
    /// Drive the system to `none` from wherever it is.
    pub async fn shutdown(&self, params: &Params) -> RcResult<SequenceReport> {
        run_sequence(self, Sequence::Shutdown, params).await
    }

    /// Drive the system from `initialised` to `trigger_enabled`.
    pub async fn start_run(&self, params: &Params) -> RcResult<SequenceReport> {
        run_sequence(self, Sequence::StartRun, params).await
    }
}
