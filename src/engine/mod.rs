mod transport;

pub use transport::{CommandTransport, SimulatedTransport};

use crate::commands::{available_actions, Action, Command, Effect};
use crate::error::{RcError, RcResult};
use crate::model::{LogRecord, Params, RcConfig, RcEvent, RcSnapshot, RunType, State};
use crate::run::RunManager;
use crate::tree::StatusTree;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sending half of the log stream. Every record is also traced.
///
/// Sends wait for channel capacity so no record is dropped while a consumer is
/// attached; once the receiver is gone records only go to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<LogRecord>>,
}

impl EventSink {
    pub fn new(tx: Option<mpsc::Sender<LogRecord>>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: RcEvent) {
        match &event {
            RcEvent::Progress { .. } => debug!(message = %event.to_message()),
            RcEvent::CommandFailed { .. } => warn!(message = %event.to_message()),
            _ => info!(message = %event.to_message()),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(LogRecord::now(event)).await;
        }
    }
}

/// Everything a command mutates, guarded together.
#[derive(Debug)]
struct Core {
    state: State,
    tree: StatusTree,
    run: RunManager,
}

impl Core {
    fn apply(&mut self, command: Command) -> State {
        let to = command.transition().to;
        for effect in command.effects() {
            match effect {
                Effect::BeginRun => self.run.begin_run(),
                Effect::EndRun => self.run.end_run(),
                Effect::ResetSkeletal => self.tree.reset_skeletal(to),
                Effect::StampFull => self.tree.stamp_full(to),
            }
        }
        self.state = to;
        to
    }
}

/// Run-control state machine for one ensemble.
///
/// Commands take `&self`: observers can keep reading snapshots while a command's
/// work is suspended. At most one command is in flight per instance.
pub struct RunControl {
    core: Mutex<Core>,
    transport: Arc<dyn CommandTransport>,
    events: EventSink,
}

impl RunControl {
    pub fn new(cfg: RcConfig) -> Self {
        Self::build(cfg, None)
    }

    /// Like `new`, publishing log records on `tx`.
    pub fn with_events(cfg: RcConfig, tx: mpsc::Sender<LogRecord>) -> Self {
        Self::build(cfg, Some(tx))
    }

    fn build(cfg: RcConfig, tx: Option<mpsc::Sender<LogRecord>>) -> Self {
        let transport = SimulatedTransport::new(cfg.command_duration, cfg.sub_steps);
        Self {
            core: Mutex::new(Core {
                state: State::None,
                tree: StatusTree::new(cfg.topology),
                run: RunManager::default(),
            }),
            transport: Arc::new(transport),
            events: EventSink::new(tx),
        }
    }

    /// Replace the simulated transport.
    pub fn with_transport(mut self, transport: Arc<dyn CommandTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn state(&self) -> State {
        self.core.lock().state
    }

    pub fn available_actions(&self) -> Vec<Action> {
        available_actions(self.state()).to_vec()
    }

    pub fn required_params(&self, action: Action) -> Vec<&'static str> {
        action.required_params()
    }

    pub fn run_number(&self) -> u64 {
        self.core.lock().run.current_run_number()
    }

    pub fn run_type(&self) -> RunType {
        self.core.lock().run.current_run_type()
    }

    /// Consistent view of state, run fields and tree taken under one lock.
    pub fn snapshot(&self) -> RcSnapshot {
        let core = self.core.lock();
        RcSnapshot {
            state: core.state,
            available: available_actions(core.state).to_vec(),
            run_number: core.run.current_run_number(),
            run_type: core.run.current_run_type(),
            tree: core.tree.root().clone(),
        }
    }

    pub fn tree(&self) -> StatusTree {
        self.core.lock().tree.clone()
    }

    pub(crate) fn events(&self) -> &EventSink {
        &self.events
    }

    /// Validate and run one atomic command.
    ///
    /// State and parameters are checked and the transient state entered in one
    /// critical section, so two callers can never both start from the same state.
    /// Dropping the returned future mid-work puts the in-state back.
    pub async fn execute_command(&self, command: Command, params: &Params) -> RcResult<()> {
        let guard = self.begin(command, params)?;
        let from = guard.from;
        self.events
            .emit(RcEvent::CommandStarted {
                command,
                params: params.clone(),
            })
            .await;

        if let Err(e) = self.transport.send(command, params, &self.events).await {
            let reason = format!("{e:#}");
            drop(guard);
            self.events
                .emit(RcEvent::CommandFailed {
                    command,
                    restored: from,
                    reason: reason.clone(),
                })
                .await;
            return Err(RcError::Transport {
                command,
                message: reason,
            });
        }

        let state = guard.complete(command);
        self.events
            .emit(RcEvent::CommandCompleted { command, state })
            .await;
        Ok(())
    }

    fn begin(&self, command: Command, params: &Params) -> RcResult<InFlightGuard<'_>> {
        let mut core = self.core.lock();
        let expected = command.transition().from;
        if let State::InProgress(running) = core.state {
            return Err(RcError::Busy { running });
        }
        if core.state != expected {
            return Err(RcError::StateMismatch {
                command,
                current: core.state,
                expected,
            });
        }
        command.check_params(params)?;
        core.state = State::InProgress(command);
        Ok(InFlightGuard {
            core: &self.core,
            from: expected,
            armed: true,
        })
    }
}

/// Holds the transient state for one command. Restores `from` on drop unless
/// the command completed.
struct InFlightGuard<'a> {
    core: &'a Mutex<Core>,
    from: State,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn complete(mut self, command: Command) -> State {
        self.armed = false;
        self.core.lock().apply(command)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut core = self.core.lock();
            if core.state.is_transient() {
                core.state = self.from;
            }
        }
    }
}
