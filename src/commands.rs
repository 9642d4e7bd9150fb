//! Command table.
//!
//! The vocabulary is closed: ten atomic commands, each with one fixed in-state and
//! one fixed out-state, plus two composite sequences built from them. Names only
//! matter at the edges (`FromStr`/`Display`); everything inside the crate works on
//! the enums.

use crate::error::RcError;
use crate::model::{Params, State};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Boot,
    Conf,
    Start,
    EnableTrigger,
    DisableTrigger,
    DrainDataflow,
    StopTriggerSources,
    Stop,
    Scrap,
    Terminate,
}

/// Required in-state and resulting out-state of an atomic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub to: State,
}

/// Side effect applied to the tree or run bookkeeping when a command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    BeginRun,
    EndRun,
    ResetSkeletal,
    StampFull,
}

pub const COMMANDS: [Command; 10] = [
    Command::Boot,
    Command::Conf,
    Command::Start,
    Command::EnableTrigger,
    Command::DisableTrigger,
    Command::DrainDataflow,
    Command::StopTriggerSources,
    Command::Stop,
    Command::Scrap,
    Command::Terminate,
];

impl Command {
    pub const fn name(self) -> &'static str {
        match self {
            Command::Boot => "boot",
            Command::Conf => "conf",
            Command::Start => "start",
            Command::EnableTrigger => "enable_trigger",
            Command::DisableTrigger => "disable_trigger",
            Command::DrainDataflow => "drain_dataflow",
            Command::StopTriggerSources => "stop_trigger_sources",
            Command::Stop => "stop",
            Command::Scrap => "scrap",
            Command::Terminate => "terminate",
        }
    }

    pub const fn transition(self) -> Transition {
        let (from, to) = match self {
            Command::Boot => (State::None, State::Initialised),
            Command::Conf => (State::Initialised, State::Configured),
            Command::Start => (State::Configured, State::Ready),
            Command::EnableTrigger => (State::Ready, State::TriggerEnabled),
            Command::DisableTrigger => (State::TriggerEnabled, State::Ready),
            Command::DrainDataflow => (State::Ready, State::DataflowDrained),
            Command::StopTriggerSources => (State::DataflowDrained, State::TriggerSourcesStopped),
            Command::Stop => (State::TriggerSourcesStopped, State::Configured),
            Command::Scrap => (State::Configured, State::Initialised),
            Command::Terminate => (State::Initialised, State::None),
        };
        Transition { from, to }
    }

    pub const fn required_params(self) -> &'static [&'static str] {
        match self {
            Command::Boot => &["session"],
            Command::Conf => &["config"],
            _ => &[],
        }
    }

    /// Effects run in order once the command's work has finished.
    pub const fn effects(self) -> &'static [Effect] {
        match self {
            Command::Start => &[Effect::BeginRun, Effect::StampFull],
            Command::DrainDataflow => &[Effect::EndRun, Effect::StampFull],
            Command::Terminate => &[Effect::ResetSkeletal],
            _ => &[Effect::StampFull],
        }
    }

    /// First declared parameter missing from `params`, if any.
    pub fn check_params(self, params: &Params) -> Result<(), RcError> {
        match self
            .required_params()
            .iter()
            .find(|p| !params.contains_key(**p))
        {
            Some(parameter) => Err(RcError::MissingParameter {
                command: self,
                parameter: *parameter,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sequence {
    StartRun,
    Shutdown,
}

impl Sequence {
    pub const fn name(self) -> &'static str {
        match self {
            Sequence::StartRun => "start_run",
            Sequence::Shutdown => "shutdown",
        }
    }

    pub const fn steps(self) -> &'static [Command] {
        match self {
            Sequence::StartRun => &[Command::Conf, Command::Start, Command::EnableTrigger],
            Sequence::Shutdown => &[
                Command::DisableTrigger,
                Command::DrainDataflow,
                Command::StopTriggerSources,
                Command::Stop,
                Command::Scrap,
                Command::Terminate,
            ],
        }
    }

    /// Union of the steps' declarations, in first-seen order.
    pub fn required_params(self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for p in self.steps().iter().flat_map(|c| c.required_params()) {
            if !out.contains(p) {
                out.push(*p);
            }
        }
        out
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything a caller can request: an atomic command or a composite sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Action {
    Atomic(Command),
    Sequence(Sequence),
}

use Action::{Atomic, Sequence as Seq};

/// Fixed panel order for observers.
pub const ALL_ACTIONS: [Action; 12] = [
    Atomic(Command::Boot),
    Seq(Sequence::StartRun),
    Atomic(Command::Conf),
    Atomic(Command::Terminate),
    Seq(Sequence::Shutdown),
    Atomic(Command::Scrap),
    Atomic(Command::Start),
    Atomic(Command::EnableTrigger),
    Atomic(Command::DisableTrigger),
    Atomic(Command::DrainDataflow),
    Atomic(Command::StopTriggerSources),
    Atomic(Command::Stop),
];

impl Action {
    pub const fn name(self) -> &'static str {
        match self {
            Atomic(c) => c.name(),
            Seq(s) => s.name(),
        }
    }

    pub fn required_params(self) -> Vec<&'static str> {
        match self {
            Atomic(c) => c.required_params().to_vec(),
            Seq(s) => s.required_params(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = RcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| RcError::UnknownCommand(s.to_string()))
    }
}

/// Actions offered from `state`. Transient and unlisted states offer nothing.
pub fn available_actions(state: State) -> &'static [Action] {
    match state {
        State::None => &[Atomic(Command::Boot)],
        State::Initialised => &[
            Seq(Sequence::StartRun),
            Atomic(Command::Conf),
            Atomic(Command::Terminate),
            Seq(Sequence::Shutdown),
        ],
        State::Configured => &[
            Seq(Sequence::StartRun),
            Atomic(Command::Scrap),
            Seq(Sequence::Shutdown),
            Atomic(Command::Start),
        ],
        State::Ready => &[
            Atomic(Command::EnableTrigger),
            Atomic(Command::DrainDataflow),
            Seq(Sequence::Shutdown),
        ],
        State::TriggerEnabled => &[Atomic(Command::DisableTrigger), Seq(Sequence::Shutdown)],
        State::DataflowDrained => &[Atomic(Command::StopTriggerSources), Seq(Sequence::Shutdown)],
        State::TriggerSourcesStopped => &[Atomic(Command::Stop), Seq(Sequence::Shutdown)],
        State::InProgress(_) => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_parses_back() {
        for action in ALL_ACTIONS {
            assert_eq!(action.name().parse::<Action>(), Ok(action));
        }
        assert_eq!(ALL_ACTIONS.len(), 12);
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "reboot".parse::<Action>(),
            Err(RcError::UnknownCommand("reboot".into()))
        );
    }

    #[test]
    fn available_atomic_commands_match_their_in_state() {
        for command in COMMANDS {
            let from = command.transition().from;
            assert!(
                available_actions(from).contains(&Atomic(command)),
                "{command} should be offered from {from}"
            );
        }
        for state in [
            State::None,
            State::Initialised,
            State::Configured,
            State::Ready,
            State::TriggerEnabled,
            State::DataflowDrained,
            State::TriggerSourcesStopped,
        ] {
            for action in available_actions(state) {
                if let Atomic(c) = action {
                    assert_eq!(c.transition().from, state);
                }
            }
        }
    }

    #[test]
    fn transient_state_offers_nothing() {
        assert!(available_actions(State::InProgress(Command::Start)).is_empty());
    }

    #[test]
    fn missing_parameter_is_reported_by_name() {
        let err = Command::Boot.check_params(&Params::new()).unwrap_err();
        assert_eq!(
            err,
            RcError::MissingParameter {
                command: Command::Boot,
                parameter: "session",
            }
        );
        assert!(Command::Stop.check_params(&Params::new()).is_ok());
    }

    #[test]
    fn sequence_params_are_union_of_steps() {
        assert_eq!(Sequence::StartRun.required_params(), vec!["config"]);
        assert!(Sequence::Shutdown.required_params().is_empty());
    }
}
