//! # Retry Queue (C6)
//!
//! Unbounded FIFO of requests awaiting another attempt. Many concurrent
//! call tasks push onto it; only the dispatcher loop ever pops. An
//! unbounded MPSC channel gives exactly this contract idiomatically —
//! `Sender::send` never blocks, and `Receiver::try_recv` is the
//! non-blocking pop the admission loop needs.

use tokio::sync::mpsc;

use crate::record::RequestRecord;

pub struct RetryQueue {
    sender: mpsc::UnboundedSender<RequestRecord>,
    receiver: mpsc::UnboundedReceiver<RequestRecord>,
}

/// The half of the queue call tasks use to re-enqueue a record. Cloneable
/// so every spawned task can hold one independently of the dispatcher.
#[derive(Clone)]
pub struct RetryQueueHandle {
    sender: mpsc::UnboundedSender<RequestRecord>,
}

impl RetryQueueHandle {
    pub fn push(&self, record: RequestRecord) {
        // The receiver lives on the dispatcher loop for the process
        // lifetime; a send error here would mean the loop already
        // exited, which only happens after every in-flight task (this one
        // included) has reached a terminal state.
        let _ = self.sender.send(record);
    }
}

impl RetryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> RetryQueueHandle {
        RetryQueueHandle {
            sender: self.sender.clone(),
        }
    }

    /// Non-blocking pop: `None` if the queue is currently empty.
    pub fn try_pop(&mut self) -> Option<RequestRecord> {
        self.receiver.try_recv().ok()
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}
