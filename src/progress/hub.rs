//! In-memory progress broadcast hub
//!
//! `publish` enqueues onto a bounded queue and returns; a single
//! delivery task drains the queue, applies per-(job, item) rate
//! limiting and fans events out to every live subscriber over its own
//! bounded channel. A slow or stuck subscriber can therefore never
//! stall the publisher, only lose its own events and eventually its
//! connection. There is no history: a new subscriber sees only events
//! published after it connected.

use crate::config::ProgressConfig;
use crate::progress::event::{ProgressEvent, ProgressStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Messages a subscriber receives over its duplex connection
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Connection acknowledgement, sent once on subscribe
    Connected,
    /// A published progress event
    Event(ProgressEvent),
    /// Hub-initiated keepalive probe
    Ping,
    /// Reply to a subscriber keepalive
    Pong,
}

struct SubscriberEntry {
    tx: mpsc::Sender<HubMessage>,
    strikes: u32,
    last_seen: Instant,
}

struct HubShared {
    subscribers: Mutex<HashMap<u64, SubscriberEntry>>,
    next_id: AtomicU64,
}

/// Live progress publish/subscribe hub
///
/// Must be created inside a tokio runtime; construction spawns the
/// delivery task, which exits when the hub is dropped.
pub struct ProgressHub {
    shared: Arc<HubShared>,
    queue_tx: mpsc::Sender<ProgressEvent>,
    subscriber_buffer: usize,
}

impl ProgressHub {
    /// Creates a hub with per-job-kind rate-limit overrides
    ///
    /// `job_intervals` maps a job kind to its minimum emission interval
    /// per (job, item) pair; kinds not present use the configured
    /// default.
    pub fn new(config: ProgressConfig, job_intervals: HashMap<String, Duration>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size);
        let shared = Arc::new(HubShared {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });

        let policy = DeliveryPolicy {
            default_interval: Duration::from_millis(config.min_interval_ms),
            job_intervals,
            max_strikes: config.max_strikes,
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            keepalive_timeout: Duration::from_secs(config.keepalive_timeout_secs),
        };

        tokio::spawn(delivery_task(queue_rx, shared.clone(), policy));

        Self {
            shared,
            queue_tx,
            subscriber_buffer: config.subscriber_buffer,
        }
    }

    /// Enqueues an event for delivery; never blocks
    ///
    /// If the internal queue is full the event is dropped with a
    /// warning, trading completeness for publisher latency.
    pub fn publish(&self, event: ProgressEvent) {
        match self.queue_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "Progress queue full, dropping {:?} event for {}",
                    event.status,
                    event.job_kind
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Progress delivery task gone, dropping event");
            }
        }
    }

    /// Registers a live observer connection
    ///
    /// The subscription receives a `Connected` acknowledgement first,
    /// then only events published after this call.
    pub fn subscribe(&self) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);

        // Buffer is freshly empty, the ack always fits
        let _ = tx.try_send(HubMessage::Connected);

        let mut subscribers = self.shared.subscribers.lock().unwrap();
        subscribers.insert(
            id,
            SubscriberEntry {
                tx,
                strikes: 0,
                last_seen: Instant::now(),
            },
        );
        tracing::info!("Subscriber {} connected ({} total)", id, subscribers.len());

        Subscription {
            id,
            rx,
            shared: self.shared.clone(),
        }
    }

    /// Removes a subscriber; also happens automatically when its
    /// `Subscription` is dropped
    pub fn unsubscribe(&self, id: u64) {
        remove_subscriber(&self.shared, id);
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().unwrap().len()
    }
}

/// One live observer connection
///
/// Dropping the subscription disconnects it from the hub.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<HubMessage>,
    shared: Arc<HubShared>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receives the next message; `None` once disconnected
    pub async fn next(&mut self) -> Option<HubMessage> {
        self.rx.recv().await
    }

    /// Sends a keepalive; the hub refreshes this connection's deadline
    /// and replies with a `Pong`
    pub fn keepalive(&self) {
        let mut subscribers = self.shared.subscribers.lock().unwrap();
        if let Some(entry) = subscribers.get_mut(&self.id) {
            entry.last_seen = Instant::now();
            let _ = entry.tx.try_send(HubMessage::Pong);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        remove_subscriber(&self.shared, self.id);
    }
}

fn remove_subscriber(shared: &HubShared, id: u64) {
    let mut subscribers = shared.subscribers.lock().unwrap();
    if subscribers.remove(&id).is_some() {
        tracing::info!(
            "Subscriber {} disconnected ({} remain)",
            id,
            subscribers.len()
        );
    }
}

struct DeliveryPolicy {
    default_interval: Duration,
    job_intervals: HashMap<String, Duration>,
    max_strikes: u32,
    heartbeat: Duration,
    keepalive_timeout: Duration,
}

impl DeliveryPolicy {
    fn interval_for(&self, job_kind: &str) -> Duration {
        self.job_intervals
            .get(job_kind)
            .copied()
            .unwrap_or(self.default_interval)
    }
}

/// The hub's single delivery loop
///
/// Exits when every `ProgressHub` handle is dropped (the queue sender
/// closes).
async fn delivery_task(
    mut queue_rx: mpsc::Receiver<ProgressEvent>,
    shared: Arc<HubShared>,
    policy: DeliveryPolicy,
) {
    let mut last_emit: HashMap<(String, String), Instant> = HashMap::new();
    let mut heartbeat = tokio::time::interval(policy.heartbeat);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = queue_rx.recv() => {
                let Some(event) = received else { break };
                if !should_deliver(&event, &mut last_emit, &policy) {
                    tracing::trace!(
                        "Coalesced burst event for ({}, {})",
                        event.job_kind,
                        event.item_id
                    );
                    continue;
                }
                if event.status.is_terminal() {
                    // The run is over, its rate-limit keys are dead
                    last_emit.retain(|(kind, _), _| kind != &event.job_kind);
                }
                fan_out(&shared, HubMessage::Event(event), policy.max_strikes);
            }
            _ = heartbeat.tick() => {
                probe_subscribers(&shared, policy.keepalive_timeout);
            }
        }
    }

    tracing::debug!("Progress delivery task shutting down");
}

/// Rate limiting: at most one event per (job, item) per interval.
/// Starting and terminal events always pass; coalescing those away
/// would break the one-summary-event guarantee.
fn should_deliver(
    event: &ProgressEvent,
    last_emit: &mut HashMap<(String, String), Instant>,
    policy: &DeliveryPolicy,
) -> bool {
    if event.status.is_terminal() || event.status == ProgressStatus::Starting {
        return true;
    }

    let key = (event.job_kind.clone(), event.item_id.clone());
    let interval = policy.interval_for(&event.job_kind);
    let now = Instant::now();

    match last_emit.get(&key) {
        Some(last) if now.duration_since(*last) < interval => false,
        _ => {
            last_emit.insert(key, now);
            true
        }
    }
}

/// Delivers one message to every subscriber without blocking
///
/// A full channel is a strike; subscribers at the strike limit are
/// dropped, as are closed ones.
fn fan_out(shared: &HubShared, message: HubMessage, max_strikes: u32) {
    let mut subscribers = shared.subscribers.lock().unwrap();
    let mut dropped = Vec::new();

    for (id, entry) in subscribers.iter_mut() {
        match entry.tx.try_send(message.clone()) {
            Ok(()) => entry.strikes = 0,
            Err(TrySendError::Full(_)) => {
                entry.strikes += 1;
                if entry.strikes >= max_strikes {
                    tracing::warn!("Subscriber {} too slow, dropping after {} missed deliveries", id, entry.strikes);
                    dropped.push(*id);
                }
            }
            Err(TrySendError::Closed(_)) => dropped.push(*id),
        }
    }

    for id in dropped {
        subscribers.remove(&id);
    }
}

/// Heartbeat pass: ping everyone, and drop connections whose keepalive
/// deadline lapsed and whose probe could not even be enqueued
fn probe_subscribers(shared: &HubShared, keepalive_timeout: Duration) {
    let mut subscribers = shared.subscribers.lock().unwrap();
    let mut dropped = Vec::new();

    for (id, entry) in subscribers.iter_mut() {
        let probe = entry.tx.try_send(HubMessage::Ping);
        if entry.last_seen.elapsed() > keepalive_timeout && probe.is_err() {
            tracing::warn!("Subscriber {} unresponsive, dropping", id);
            dropped.push(*id);
        } else if matches!(probe, Err(TrySendError::Closed(_))) {
            dropped.push(*id);
        }
    }

    for id in dropped {
        subscribers.remove(&id);
    }
}
