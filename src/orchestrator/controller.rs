//! Request loop.
//!
//! Takes requests from presentation layers, queues them, and runs one action at a
//! time against the shared state machine.

use crate::commands::Action;
use crate::engine::RunControl;
use crate::error::RcResult;
use crate::model::{Params, RcEvent};
use crate::orchestrator::sequencer::{run_sequence, SequenceReport};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

/// Requests emitted by UI layers.
#[derive(Debug, Clone)]
pub enum ControlRequest {
    Run { action: Action, params: Params },
    /// Let the running action finish, then stop; queued requests are dropped.
    Quit,
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Command,
    Sequence(SequenceReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Run one action, atomic or composite.
pub async fn perform(rc: &RunControl, action: Action, params: &Params) -> RcResult<ActionOutcome> {
    match action {
        Action::Atomic(command) => {
            rc.execute_command(command, params).await?;
            Ok(ActionOutcome::Command)
        }
        Action::Sequence(sequence) => Ok(ActionOutcome::Sequence(
            run_sequence(rc, sequence, params).await?,
        )),
    }
}

struct InFlight {
    action: Action,
    handle: JoinHandle<RcResult<ActionOutcome>>,
}

fn spawn_action(rc: &Arc<RunControl>, action: Action, params: Params) -> InFlight {
    let rc = rc.clone();
    let handle = tokio::spawn(async move { perform(&rc, action, &params).await });
    InFlight { action, handle }
}

/// Serve requests until `Quit`, or until the request channel closes and the queue
/// is drained.
pub async fn run_controller(
    rc: Arc<RunControl>,
    mut req_rx: UnboundedReceiver<ControlRequest>,
) -> Result<ControllerSummary> {
    let mut summary = ControllerSummary::default();
    let mut queue: VecDeque<(Action, Params)> = VecDeque::new();
    let mut in_flight: Option<InFlight> = None;
    let mut requests_open = true;
    let mut quit_pending = false;

    loop {
        if in_flight.is_none() {
            if quit_pending {
                break;
            }
            if let Some((action, params)) = queue.pop_front() {
                debug!(%action, "dispatching");
                in_flight = Some(spawn_action(&rc, action, params));
            } else if !requests_open {
                break;
            }
        }

        tokio::select! {
            req = req_rx.recv(), if requests_open => {
                match req {
                    Some(ControlRequest::Run { action, params }) => {
                        if !quit_pending {
                            queue.push_back((action, params));
                        }
                    }
                    Some(ControlRequest::Quit) => {
                        quit_pending = true;
                        if !queue.is_empty() {
                            rc.events()
                                .emit(RcEvent::Info(format!(
                                    "Quitting, dropped {} queued request(s)",
                                    queue.len()
                                )))
                                .await;
                            queue.clear();
                        }
                    }
                    None => {
                        requests_open = false;
                    }
                }
            }
            // Borrow the handle in place; taking it here would lose the result if
            // the request branch wins.
            done = async {
                match in_flight.as_mut() {
                    Some(f) => (f.action, (&mut f.handle).await),
                    None => futures::future::pending().await,
                }
            } => {
                in_flight = None;
                let (action, join_res) = done;
                match join_res {
                    Ok(Ok(outcome)) => {
                        summary.executed += 1;
                        if let ActionOutcome::Sequence(report) = outcome {
                            rc.events().emit(RcEvent::Info(report.summary())).await;
                        }
                    }
                    Ok(Err(e)) => {
                        summary.failed += 1;
                        rc.events()
                            .emit(RcEvent::Info(format!("'{action}' failed: {e}")))
                            .await;
                    }
                    Err(e) => {
                        summary.failed += 1;
                        rc.events()
                            .emit(RcEvent::Info(format!("'{action}' join failed: {e}")))
                            .await;
                    }
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Command, Sequence};
    use crate::model::{RcConfig, State};
    use tokio::sync::mpsc;

    fn run(action: Action, params: &[(&str, &str)]) -> ControlRequest {
        ControlRequest::Run {
            action,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn queued_requests_run_in_order() {
        let rc = Arc::new(RunControl::new(RcConfig::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(run(Action::Atomic(Command::Boot), &[("session", "s")]))
            .expect("send");
        tx.send(run(Action::Sequence(Sequence::StartRun), &[("config", "c")]))
            .expect("send");
        drop(tx);

        let summary = run_controller(rc.clone(), rx).await.expect("controller");
        assert_eq!(
            summary,
            ControllerSummary {
                executed: 2,
                failed: 0
            }
        );
        assert_eq!(rc.state(), State::TriggerEnabled);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_report_is_logged() {
        let (evt_tx, mut evt_rx) = mpsc::channel(256);
        let rc = Arc::new(RunControl::with_events(
            RcConfig {
                sub_steps: 1,
                ..RcConfig::default()
            },
            evt_tx,
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(run(Action::Atomic(Command::Boot), &[("session", "s")]))
            .expect("send");
        tx.send(run(Action::Sequence(Sequence::Shutdown), &[]))
            .expect("send");
        drop(tx);

        run_controller(rc.clone(), rx).await.expect("controller");
        drop(rc);

        let mut infos = Vec::new();
        while let Some(record) = evt_rx.recv().await {
            if let RcEvent::Info(msg) = record.event {
                infos.push(msg);
            }
        }
        assert_eq!(
            infos,
            vec!["'shutdown' ran [terminate], skipped [disable_trigger, drain_dataflow, \
                  stop_trigger_sources, stop, scrap]"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_and_loop_continues() {
        let rc = Arc::new(RunControl::new(RcConfig::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(run(Action::Atomic(Command::Start), &[])).expect("send");
        tx.send(run(Action::Atomic(Command::Boot), &[("session", "s")]))
            .expect("send");
        drop(tx);

        let summary = run_controller(rc.clone(), rx).await.expect("controller");
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(rc.state(), State::Initialised);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_drops_queue_after_current_action() {
        let rc = Arc::new(RunControl::new(RcConfig::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(run(Action::Atomic(Command::Boot), &[("session", "s")]))
            .expect("send");
        tx.send(run(Action::Atomic(Command::Conf), &[("config", "c")]))
            .expect("send");
        tx.send(ControlRequest::Quit).expect("send");

        let summary = run_controller(rc.clone(), rx).await.expect("controller");
        assert_eq!(summary.executed, 1);
        assert_eq!(rc.state(), State::Initialised);
        drop(tx);
    }
}
