//! Update queue: an unbounded MPSC FIFO of mutation batches.
//!
//! Producers (the receive path, cast expiry) only push; they never touch
//! store internals.  The single consumer is [`EntityStore::apply_pending`],
//! which serializes draining so FIFO order holds end to end.
//!
//! [`EntityStore::apply_pending`]: crate::store::EntityStore::apply_pending

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::mutation::MutationBatch;

#[derive(Debug)]
pub struct UpdateQueue {
    tx: Sender<MutationBatch>,
    rx: Receiver<MutationBatch>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append a batch.  Never blocks.
    pub fn push(&self, batch: MutationBatch) {
        if batch.is_empty() {
            return;
        }
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(batch);
    }

    /// A cloneable producer handle for other threads.
    pub fn producer(&self) -> Sender<MutationBatch> {
        self.tx.clone()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<MutationBatch> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}
