//! Queue, retry and credential behaviour of the uploader against a scripted
//! transport. Runs on a paused clock so backoff delays are exact.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use tapedeck_core::error::{Result, TapedeckError};
use tapedeck_tracker::sender::{QueueSender, RetryPolicy, SenderEvent};
use tapedeck_tracker::transport::{Delivery, IngestTransport};

#[derive(Debug, Clone)]
struct Call {
    delivery: Delivery,
    at: Instant,
}

/// Replies from `script` in order, then 200 forever.
#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Result<u16>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Clone, Default)]
struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    fn with_script(script: Vec<Result<u16>>) -> Self {
        let t = Self::default();
        *t.shared.script.lock().unwrap() = script.into();
        t
    }

    fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<Bytes> {
        self.calls().into_iter().map(|c| c.delivery.body).collect()
    }
}

#[async_trait]
impl IngestTransport for ScriptedTransport {
    async fn post(&self, delivery: Delivery) -> Result<u16> {
        let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.shared.calls.lock().unwrap().push(Call {
            delivery,
            at: Instant::now(),
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(200))
    }
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        attempt_timeout: Duration::from_millis(1000),
    }
}

async fn next_event(events: &mut UnboundedReceiver<SenderEvent>) -> SenderEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn batch(tag: u8, len: usize) -> Bytes {
    Bytes::from(vec![tag; len])
}

#[tokio::test(start_paused = true)]
async fn delivers_in_enqueue_order_one_at_a_time() {
    let transport = ScriptedTransport::default();
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    for tag in 1..=5u8 {
        sender.enqueue(batch(tag, 16 + tag as usize));
    }

    for tag in 1..=5u8 {
        assert_eq!(
            next_event(&mut events).await,
            SenderEvent::Delivered {
                bytes: 16 + tag as usize
            }
        );
    }

    let calls = transport.calls();
    assert_eq!(calls.len(), 5);
    let order: Vec<u8> = calls.iter().map(|c| c.delivery.body[0]).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
    assert!(calls.iter().all(|c| c.delivery.token == "t1"));
    assert_eq!(transport.shared.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        sender.metrics().deliveries.get(&[("outcome", "ok")]),
        5
    );
}

#[tokio::test(start_paused = true)]
async fn keepalive_only_below_64_kib() {
    let transport = ScriptedTransport::default();
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 65_535));
    sender.enqueue(batch(2, 65_536));
    next_event(&mut events).await;
    next_event(&mut events).await;

    let calls = transport.calls();
    assert_eq!(calls[0].delivery.body.len(), 65_535);
    assert!(calls[0].delivery.keepalive);
    assert_eq!(calls[1].delivery.body.len(), 65_536);
    assert!(!calls[1].delivery.keepalive);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_once_and_halt() {
    let transport = ScriptedTransport::with_script(vec![Ok(500), Ok(502), Ok(503)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 8));

    match next_event(&mut events).await {
        SenderEvent::Failed { reason } => assert!(reason.contains("3 attempts"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }

    // Plenty of time for any stray retry to fire.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert!(events.try_recv().is_err());

    // linear backoff: 1s then 2s (plus the 10ms request itself)
    assert!(calls[1].at - calls[0].at >= Duration::from_millis(1000));
    assert!(calls[1].at - calls[0].at < Duration::from_millis(2000));
    assert!(calls[2].at - calls[1].at >= Duration::from_millis(2000));
    assert!(calls[2].at - calls[1].at < Duration::from_millis(3000));

    // still busy: new batches queue up and nothing is sent
    sender.enqueue(batch(2, 8));
    sender.authorise("t2");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.calls().len(), 3);
    assert!(sender.metrics().is_halted());
}

#[tokio::test(start_paused = true)]
async fn transport_errors_are_retried() {
    let transport = ScriptedTransport::with_script(vec![
        Err(TapedeckError::Transport("connection reset".into())),
        Ok(200),
    ]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(7, 4));

    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    assert_eq!(transport.bodies(), vec![batch(7, 4), batch(7, 4)]);
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_attempt_counter() {
    let transport =
        ScriptedTransport::with_script(vec![Ok(500), Ok(200), Ok(500), Ok(500), Ok(200)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 4));
    sender.enqueue(batch(2, 4));

    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    assert_eq!(transport.calls().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_goes_idle_without_retry() {
    let transport = ScriptedTransport::with_script(vec![Ok(401)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("stale");
    sender.enqueue(batch(1, 4));
    assert_eq!(next_event(&mut events).await, SenderEvent::Unauthorized);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.calls().len(), 1);

    sender.authorise("fresh");
    sender.enqueue(batch(2, 4));
    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].delivery.token, "fresh");
    assert_eq!(calls[1].delivery.body, batch(2, 4));
}

#[tokio::test(start_paused = true)]
async fn batches_wait_for_a_credential() {
    let transport = ScriptedTransport::default();
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.enqueue(batch(1, 4));
    sender.enqueue(batch(2, 4));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(transport.calls().is_empty());
    assert_eq!(sender.metrics().queue_depth.get(&[]), 2);

    sender.authorise("t1");
    next_event(&mut events).await;
    next_event(&mut events).await;
    assert_eq!(transport.bodies(), vec![batch(1, 4), batch(2, 4)]);
}

#[tokio::test(start_paused = true)]
async fn clean_discards_queue_and_credential() {
    let transport = ScriptedTransport::default();
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.enqueue(batch(1, 4));
    sender.enqueue(batch(2, 4));
    sender.clean();
    sender.authorise("t1");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(transport.calls().is_empty());

    sender.enqueue(batch(3, 4));
    next_event(&mut events).await;
    assert_eq!(transport.bodies(), vec![batch(3, 4)]);
}

#[tokio::test(start_paused = true)]
async fn clean_keeps_the_batch_awaiting_retry() {
    let transport = ScriptedTransport::with_script(vec![Ok(500)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 4));
    // first attempt fails at ~10ms; its retry is due at ~1010ms
    tokio::time::sleep(Duration::from_millis(500)).await;

    sender.clean();
    sender.authorise("t2");
    sender.enqueue(batch(2, 4));

    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    let calls = transport.calls();
    assert_eq!(
        transport.bodies(),
        vec![batch(1, 4), batch(1, 4), batch(2, 4)]
    );
    assert_eq!(calls[1].delivery.token, "t2");
    assert_eq!(calls[2].delivery.token, "t2");
}

#[tokio::test(start_paused = true)]
async fn retry_after_clean_waits_for_a_credential() {
    let transport = ScriptedTransport::with_script(vec![Ok(500)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 4));
    sender.enqueue(batch(2, 4));
    tokio::time::sleep(Duration::from_millis(500)).await;
    sender.clean();

    // the retry fires with no credential: nothing is posted, nothing reported
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.bodies(), vec![batch(1, 4)]);
    assert!(events.try_recv().is_err());
    assert_eq!(sender.metrics().queue_depth.get(&[]), 1);

    sender.authorise("t3");
    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    tokio::time::sleep(Duration::from_secs(5)).await;
    let calls = transport.calls();
    assert_eq!(transport.bodies(), vec![batch(1, 4), batch(1, 4)]);
    assert_eq!(calls[1].delivery.token, "t3");
}

#[tokio::test(start_paused = true)]
async fn failure_in_flight_during_clean_is_still_retried() {
    let transport = ScriptedTransport::with_script(vec![Ok(503)]);
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 4));
    // request is on the wire (10ms) when the uploader is cleaned
    sender.clean();
    sender.authorise("t2");

    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    assert_eq!(transport.bodies(), vec![batch(1, 4), batch(1, 4)]);
    assert_eq!(transport.calls()[1].delivery.token, "t2");
}

#[tokio::test(start_paused = true)]
async fn in_flight_request_survives_clean() {
    let transport = ScriptedTransport::default();
    let (sender, mut events) = QueueSender::spawn(transport.clone(), policy(3));

    sender.authorise("t1");
    sender.enqueue(batch(1, 4));
    sender.enqueue(batch(2, 4));
    sender.clean();

    assert_eq!(next_event(&mut events).await, SenderEvent::Delivered { bytes: 4 });
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.bodies(), vec![batch(1, 4)]);
}
