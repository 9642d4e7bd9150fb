use crate::commands::{Action, Command, Sequence};
use crate::tree::Node;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Named parameters passed along with a command. Open set; only the declared
/// required names are checked.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcConfig {
    /// Wall time one simulated command takes.
    #[serde(with = "humantime_serde")]
    pub command_duration: Duration,
    /// Number of progress records emitted per command.
    pub sub_steps: u32,
    pub event_capacity: usize,
    #[serde(default)]
    pub topology: Topology,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            command_duration: Duration::from_secs(10),
            sub_steps: 10,
            event_capacity: 256,
            topology: Topology::default(),
        }
    }
}

/// Shape of the controlled hierarchy: one top node, ordered categories, and the
/// leaf applications each category holds once the system is booted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub top: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub applications: Vec<String>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            top: "daq".into(),
            categories: vec![
                Category {
                    name: "dataflow".into(),
                    applications: vec!["dfo".into(), "dataflow-writer".into()],
                },
                Category {
                    name: "trigger".into(),
                    applications: vec!["mlt".into(), "tp-source".into()],
                },
            ],
        }
    }
}

/// Operating state of the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    None,
    Initialised,
    Configured,
    Ready,
    TriggerEnabled,
    DataflowDrained,
    TriggerSourcesStopped,
    /// Held only while the command's work is running.
    InProgress(Command),
}

impl State {
    pub fn is_transient(self) -> bool {
        matches!(self, State::InProgress(_))
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::None => f.write_str("none"),
            State::Initialised => f.write_str("initialised"),
            State::Configured => f.write_str("configured"),
            State::Ready => f.write_str("ready"),
            State::TriggerEnabled => f.write_str("trigger_enabled"),
            State::DataflowDrained => f.write_str("dataflow_drained"),
            State::TriggerSourcesStopped => f.write_str("trigger_sources_stopped"),
            State::InProgress(command) => write!(f, "{}ing", command.name()),
        }
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunType {
    #[default]
    Stopped,
    Test,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Stopped => f.write_str("STOPPED"),
            RunType::Test => f.write_str("TEST"),
        }
    }
}

/// Point-in-time view of the orchestrator for observers.
#[derive(Debug, Clone, Serialize)]
pub struct RcSnapshot {
    pub state: State,
    pub available: Vec<Action>,
    pub run_number: u64,
    pub run_type: RunType,
    pub tree: Node,
}

/// Progress records emitted by the state machine and sequences.
#[derive(Debug, Clone, Serialize)]
pub enum RcEvent {
    CommandStarted {
        command: Command,
        params: Params,
    },
    Progress {
        command: Command,
        step: u32,
        total: u32,
    },
    CommandCompleted {
        command: Command,
        state: State,
    },
    CommandFailed {
        command: Command,
        restored: State,
        reason: String,
    },
    SequenceStarted {
        sequence: Sequence,
        from: State,
    },
    StepSkipped {
        sequence: Sequence,
        command: Command,
        state: State,
    },
    SequenceCompleted {
        sequence: Sequence,
        state: State,
    },
    Info(String),
}

impl RcEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            RcEvent::CommandStarted { command, params } if params.is_empty() => {
                format!("Preparing to send '{command}'")
            }
            RcEvent::CommandStarted { command, params } => {
                let args: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("Preparing to send '{command}' ({})", args.join(", "))
            }
            RcEvent::Progress {
                command,
                step,
                total,
            } => format!("Sending {command}... {step}/{total}"),
            RcEvent::CommandCompleted { command, state } => {
                format!("Sent '{command}', now '{state}'")
            }
            RcEvent::CommandFailed {
                command,
                restored,
                reason,
            } => format!("'{command}' failed ({reason}), back to '{restored}'"),
            RcEvent::SequenceStarted { sequence, from } => {
                format!("Running '{sequence}' from '{from}'")
            }
            RcEvent::StepSkipped {
                sequence,
                command,
                state,
            } => format!("{sequence}: skipping '{command}' in '{state}'"),
            RcEvent::SequenceCompleted { sequence, state } => {
                format!("'{sequence}' finished in '{state}'")
            }
            RcEvent::Info(msg) => msg.clone(),
        }
    }
}

/// One entry of the log stream.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp_utc: String,
    pub event: RcEvent,
}

impl LogRecord {
    pub fn now(event: RcEvent) -> Self {
        Self {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_state_reads_as_command_ing() {
        assert_eq!(State::InProgress(Command::Boot).to_string(), "booting");
        assert_eq!(State::InProgress(Command::Conf).to_string(), "confing");
        assert!(State::InProgress(Command::Stop).is_transient());
        assert!(!State::Ready.is_transient());
    }

    #[test]
    fn config_reads_humantime_durations() {
        let cfg: RcConfig = serde_json::from_str(
            r#"{"command_duration":"1500ms","sub_steps":3,"event_capacity":8}"#,
        )
        .expect("parse config");
        assert_eq!(cfg.command_duration, Duration::from_millis(1500));
        assert_eq!(cfg.topology, Topology::default());
    }

    #[test]
    fn started_message_lists_params() {
        let mut params = Params::new();
        params.insert("session".into(), "np04".into());
        let ev = RcEvent::CommandStarted {
            command: Command::Boot,
            params,
        };
        assert_eq!(ev.to_message(), "Preparing to send 'boot' (session=np04)");
    }
}
