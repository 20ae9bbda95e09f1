//! Batch uploader.
//!
//! `QueueSender` is a cheap handle; all state lives in one background task
//! that owns the FIFO queue and the credential. Guarantees:
//! - at most one POST in flight, batches delivered in enqueue order
//! - no credential → batches accumulate, nothing is dropped
//! - 401 → idle + `SenderEvent::Unauthorized`, never retried
//! - other ≥400 / transport errors → retried after `attempt × attempt_timeout`;
//!   once `max_attempts` is reached `SenderEvent::Failed` is emitted and the
//!   uploader stays busy (no automatic recovery)
//! - `clean()` discards only unsent batches; the current one runs to a
//!   terminal outcome

mod worker;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::obs::SenderMetrics;
use crate::transport::IngestTransport;

use worker::{Command, Worker};

/// Retry budget for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed POSTs allowed per batch before giving up.
    pub max_attempts: u32,
    /// Base interval of the linear backoff.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_timeout: Duration::from_millis(1000),
        }
    }
}

/// Signals surfaced to the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    /// A batch was acknowledged with a 2xx.
    Delivered { bytes: usize },
    /// The endpoint rejected the credential; call `authorise` with a new one.
    Unauthorized,
    /// Retries for the current batch are exhausted. Delivery is halted.
    Failed { reason: String },
}

/// Handle to the uploader task.
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<Command>,
    metrics: Arc<SenderMetrics>,
}

impl QueueSender {
    /// Start the uploader on the current tokio runtime.
    ///
    /// The task stops once every handle is dropped and no request or retry
    /// timer is outstanding.
    pub fn spawn<T: IngestTransport>(
        transport: T,
        policy: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<SenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(SenderMetrics::default());

        let worker = Worker::new(Arc::new(transport), policy, events_tx, Arc::clone(&metrics));
        tokio::spawn(worker.run(rx));

        (Self { tx, metrics }, events_rx)
    }

    /// Install or replace the credential; resumes draining when idle.
    pub fn authorise(&self, token: impl Into<String>) {
        self.submit(Command::Authorise(token.into()));
    }

    /// Queue a batch, or send it right away when idle and authorised.
    pub fn enqueue(&self, batch: impl Into<Bytes>) {
        self.submit(Command::Enqueue(batch.into()));
    }

    /// Drop queued (not yet sent) batches and the credential. The batch in
    /// flight or awaiting a retry is kept; its retries wait for the next
    /// `authorise`.
    pub fn clean(&self) {
        self.submit(Command::Clean);
    }

    pub fn metrics(&self) -> Arc<SenderMetrics> {
        Arc::clone(&self.metrics)
    }

    fn submit(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!("uploader task is gone; command dropped");
        }
    }
}
