use crate::commands::Command;
use crate::engine::EventSink;
use crate::model::{Params, RcEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Delivers a command to the controlled applications.
///
/// Called with the state machine already in the command's transient state;
/// returning `Err` rolls the state back.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send(&self, command: Command, params: &Params, events: &EventSink) -> Result<()>;
}

/// Stand-in for the remote protocol: waits `duration`, split into `sub_steps`
/// sleeps, with one progress record per step.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    duration: Duration,
    sub_steps: u32,
}

impl SimulatedTransport {
    pub fn new(duration: Duration, sub_steps: u32) -> Self {
        Self {
            duration,
            sub_steps: sub_steps.max(1),
        }
    }
}

#[async_trait]
impl CommandTransport for SimulatedTransport {
    async fn send(&self, command: Command, _params: &Params, events: &EventSink) -> Result<()> {
        let step_duration = self.duration / self.sub_steps;
        for step in 1..=self.sub_steps {
            tokio::time::sleep(step_duration).await;
            events
                .emit(RcEvent::Progress {
                    command,
                    step,
                    total: self.sub_steps,
                })
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn emits_one_progress_record_per_step() {
        let (tx, mut rx) = mpsc::channel(16);
        let sink = EventSink::new(Some(tx));
        let transport = SimulatedTransport::new(Duration::from_secs(3), 3);

        let start = tokio::time::Instant::now();
        transport
            .send(Command::Boot, &Params::new(), &sink)
            .await
            .expect("simulated send");
        assert!(start.elapsed() >= Duration::from_secs(3));

        drop(sink);
        let mut steps = Vec::new();
        while let Some(record) = rx.recv().await {
            if let RcEvent::Progress { step, total, .. } = record.event {
                assert_eq!(total, 3);
                steps.push(step);
            }
        }
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn zero_sub_steps_still_runs_one_step() {
        let transport = SimulatedTransport::new(Duration::ZERO, 0);
        assert_eq!(transport.sub_steps, 1);
    }
}
