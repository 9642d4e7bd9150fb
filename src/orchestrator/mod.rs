//! Orchestration on top of the state machine.
//!
//! Composite sequences (`shutdown`, `start_run`) and the request loop that
//! presentation layers feed. UI/CLI layers call into this module rather than
//! driving `RunControl` concurrently themselves.

mod controller;
mod sequencer;

pub use controller::{perform, run_controller, ActionOutcome, ControlRequest, ControllerSummary};
pub use sequencer::{run_sequence, SequenceReport, StepOutcome};
