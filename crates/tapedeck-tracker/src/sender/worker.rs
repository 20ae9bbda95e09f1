use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use tapedeck_core::error::Result;

use super::{RetryPolicy, SenderEvent};
use crate::obs::SenderMetrics;
use crate::transport::{Delivery, IngestTransport};

/// Public operations, in submission order.
#[derive(Debug)]
pub(super) enum Command {
    Authorise(String),
    Enqueue(Bytes),
    Clean,
}

/// Completions of work the task started itself.
enum Internal {
    Completed {
        batch: Bytes,
        outcome: Result<u16>,
        elapsed: Duration,
    },
    Resend(Bytes),
}

pub(super) struct Worker<T> {
    transport: Arc<T>,
    policy: RetryPolicy,
    queue: VecDeque<Bytes>,
    token: Option<String>,
    busy: bool,
    attempts: u32,
    /// Requests and retry timers not yet reported back.
    pending: usize,
    events: mpsc::UnboundedSender<SenderEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: Option<mpsc::UnboundedReceiver<Internal>>,
    metrics: Arc<SenderMetrics>,
}

impl<T: IngestTransport> Worker<T> {
    pub(super) fn new(
        transport: Arc<T>,
        policy: RetryPolicy,
        events: mpsc::UnboundedSender<SenderEvent>,
        metrics: Arc<SenderMetrics>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            policy,
            queue: VecDeque::new(),
            token: None,
            busy: false,
            attempts: 0,
            pending: 0,
            events,
            internal_tx,
            internal_rx: Some(internal_rx),
            metrics,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let Some(mut internal) = self.internal_rx.take() else {
            return;
        };
        let mut open = true;

        loop {
            if !open && self.pending == 0 {
                break;
            }
            tokio::select! {
                cmd = commands.recv(), if open => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => open = false,
                },
                Some(done) = internal.recv() => self.on_internal(done),
            }
        }

        tracing::debug!(queued = self.queue.len(), "uploader task stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Authorise(token) => {
                self.token = Some(token);
                if !self.busy {
                    self.send_next();
                }
            }
            Command::Enqueue(batch) => {
                if self.busy || self.token.is_none() {
                    self.queue.push_back(batch);
                    self.update_depth();
                } else {
                    self.send_batch(batch);
                }
            }
            // the batch on the wire (or waiting on a retry timer) is kept
            Command::Clean => {
                let dropped = self.queue.len();
                self.queue.clear();
                self.token = None;
                self.update_depth();
                tracing::debug!(dropped, busy = self.busy, "uploader cleaned");
            }
        }
    }

    fn on_internal(&mut self, done: Internal) {
        self.pending = self.pending.saturating_sub(1);
        match done {
            Internal::Completed {
                batch,
                outcome,
                elapsed,
            } => self.on_completed(batch, outcome, elapsed),
            Internal::Resend(batch) => self.send_batch(batch),
        }
    }

    fn on_completed(&mut self, batch: Bytes, outcome: Result<u16>, elapsed: Duration) {
        self.metrics.delivery_duration.observe(&[], elapsed);

        let reason = match outcome {
            Ok(401) => {
                self.metrics.deliveries.inc(&[("outcome", "unauthorized")]);
                tracing::warn!(bytes = batch.len(), "ingest rejected credential");
                self.busy = false;
                self.emit(SenderEvent::Unauthorized);
                return;
            }
            Ok(status) if status >= 400 => {
                self.metrics.deliveries.inc(&[("outcome", "http_error")]);
                format!("HTTP {status}")
            }
            Ok(_) => {
                self.metrics.deliveries.inc(&[("outcome", "ok")]);
                self.metrics
                    .bytes_delivered
                    .add(&[], batch.len() as u64);
                self.attempts = 0;
                self.emit(SenderEvent::Delivered { bytes: batch.len() });
                self.send_next();
                return;
            }
            Err(e) => {
                self.metrics.deliveries.inc(&[("outcome", "transport_error")]);
                e.to_string()
            }
        };

        self.retry(batch, reason);
    }

    fn send_next(&mut self) {
        if self.token.is_none() {
            self.busy = false;
            return;
        }
        match self.queue.pop_front() {
            Some(batch) => {
                self.update_depth();
                self.send_batch(batch);
            }
            None => self.busy = false,
        }
    }

    fn send_batch(&mut self, batch: Bytes) {
        let Some(token) = self.token.clone() else {
            // parked at the head until the next `authorise`
            tracing::debug!(bytes = batch.len(), "no credential; batch parked");
            self.queue.push_front(batch);
            self.update_depth();
            self.busy = false;
            return;
        };
        self.busy = true;

        let delivery = Delivery::new(batch.clone(), token);
        tracing::debug!(bytes = batch.len(), keepalive = delivery.keepalive, "posting batch");

        let transport = Arc::clone(&self.transport);
        let tx = self.internal_tx.clone();
        self.pending += 1;
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = transport.post(delivery).await;
            let _ = tx.send(Internal::Completed {
                batch,
                outcome,
                elapsed: started.elapsed(),
            });
        });
    }

    fn retry(&mut self, batch: Bytes, reason: String) {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            // busy stays set: nothing is sent until the process is restarted
            let reason = format!(
                "failed to send batch after {} attempts (last: {reason})",
                self.attempts
            );
            tracing::error!(%reason, queued = self.queue.len(), "delivery halted");
            self.metrics.permanent_failures.inc(&[]);
            self.metrics.set_halted();
            self.emit(SenderEvent::Failed { reason });
            return;
        }

        let delay = self.policy.attempt_timeout * self.attempts;
        tracing::warn!(attempt = self.attempts, ?delay, %reason, "delivery failed; retrying");
        self.metrics.retries_scheduled.inc(&[]);

        let tx = self.internal_tx.clone();
        self.pending += 1;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::Resend(batch));
        });
    }

    fn emit(&self, event: SenderEvent) {
        let _ = self.events.send(event);
    }

    fn update_depth(&self) {
        self.metrics
            .queue_depth
            .set(&[], i64::try_from(self.queue.len()).unwrap_or(i64::MAX));
    }
}
