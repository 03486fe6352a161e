//! Cancellable outbound workflows built from explicit steps.
//!
//! A workflow never touches the mirror; it only sends commands and waits.
//! Cancelling it aborts the workflow alone: the connection and the receive
//! loop are unaffected.

use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::connection::{CancelToken, OutboundSender, SendError};
use crate::guid::Guid;
use crate::protocol::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Send(Command),
    Wait(Duration),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow '{name}' cancelled after {completed} step(s)")]
    Cancelled { name: &'static str, completed: usize },
    #[error("workflow '{name}' failed at step {step}: {source}")]
    Send {
        name: &'static str,
        step: usize,
        #[source]
        source: SendError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    name: &'static str,
    steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn then_send(mut self, command: Command) -> Self {
        self.steps.push(Step::Send(command));
        self
    }

    pub fn then_wait(mut self, delay: Duration) -> Self {
        self.steps.push(Step::Wait(delay));
        self
    }

    /// Use a game object, give the server `delay` to open it, then loot it.
    pub fn interact_then_loot(object: Guid, delay: Duration) -> Self {
        Self::new("interact_then_loot")
            .then_send(Command::GameObjUse(object))
            .then_wait(delay)
            .then_send(Command::Loot(object))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order.  Returns the number of steps completed.
    pub async fn run(
        &self,
        sender: &OutboundSender,
        cancel: &CancelToken,
    ) -> Result<usize, WorkflowError> {
        for (index, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(index));
            }
            match step {
                Step::Send(command) => {
                    sender
                        .send_command(command, cancel)
                        .await
                        .map_err(|source| match source {
                            SendError::Cancelled => self.cancelled(index),
                            source => WorkflowError::Send {
                                name: self.name,
                                step: index,
                                source,
                            },
                        })?;
                }
                Step::Wait(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(self.cancelled(index)),
                        _ = tokio::time::sleep(*delay) => {}
                    }
                }
            }
            debug!("workflow {}: step {} done", self.name, index);
        }
        Ok(self.steps.len())
    }

    fn cancelled(&self, completed: usize) -> WorkflowError {
        WorkflowError::Cancelled {
            name: self.name,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::spawn_writer;
    use crate::opcodes::cmsg;
    use tokio::io::AsyncReadExt;

    #[test]
    fn run_sends_use_then_loot() {
        tokio_test::block_on(async {
            let (ours, mut theirs) = tokio::io::duplex(256);
            let (sender, writer) = spawn_writer(ours, 4);
            let guid = Guid::new(0xF110_0000_0000_0007);
            let wf = Workflow::interact_then_loot(guid, Duration::from_millis(1));

            let done = wf.run(&sender, &CancelToken::new()).await.unwrap();
            assert_eq!(done, 3);
            drop(sender);
            writer.await.unwrap().unwrap();

            let mut wire = Vec::new();
            theirs.read_to_end(&mut wire).await.unwrap();
            assert_eq!(wire.len(), 28);
            assert_eq!(&wire[2..6], &cmsg::GAMEOBJ_USE.to_le_bytes());
            assert_eq!(&wire[16..20], &cmsg::LOOT.to_le_bytes());
            assert_eq!(&wire[20..], &guid.raw().to_le_bytes());
        });
    }

    #[test]
    fn cancel_during_wait_skips_loot() {
        tokio_test::block_on(async {
            let (ours, _theirs) = tokio::io::duplex(256);
            let (sender, _writer) = spawn_writer(ours, 4);
            let cancel = CancelToken::new();
            let wf = Workflow::interact_then_loot(Guid::new(7), Duration::from_secs(60));

            let canceller = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                canceller.cancel();
            });
            let err = wf.run(&sender, &cancel).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Cancelled { completed: 1, .. }));
        });
    }

    #[test]
    fn interact_then_loot_steps() {
        let guid = Guid::new(0xF110_0000_0000_0007);
        let wf = Workflow::interact_then_loot(guid, Duration::from_millis(500));
        assert_eq!(
            wf.steps(),
            &[
                Step::Send(Command::GameObjUse(guid)),
                Step::Wait(Duration::from_millis(500)),
                Step::Send(Command::Loot(guid)),
            ]
        );
    }
}
