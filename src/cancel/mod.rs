//! Cooperative cancellation registry
//!
//! One boolean flag per job kind, shared by every component that needs
//! to answer "should currently-running work for this kind stop".
//! Workers and backoff sleeps poll the flag; nothing is killed
//! preemptively.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Granularity of the interruptible sleep. Bounds worst-case
/// cancellation latency to one slice, not a full backoff window.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Process-wide named cancellation flags
///
/// Calling `set` twice has the same effect as once, and `reset` is
/// idempotent. The registry holds no history: it only answers whether
/// work for a kind should stop.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    flags: Mutex<HashMap<String, bool>>,
}

impl CancelRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation for a job kind
    pub fn set(&self, kind: &str) {
        let mut flags = self.flags.lock().unwrap();
        flags.insert(kind.to_string(), true);
        tracing::info!("Cancel flag set for {}", kind);
    }

    /// Returns whether cancellation was requested for a job kind
    pub fn get(&self, kind: &str) -> bool {
        let flags = self.flags.lock().unwrap();
        flags.get(kind).copied().unwrap_or(false)
    }

    /// Clears the cancellation flag for a job kind
    pub fn reset(&self, kind: &str) {
        let mut flags = self.flags.lock().unwrap();
        flags.insert(kind.to_string(), false);
    }

    /// Returns a snapshot of all known flags, for status reporting
    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.flags.lock().unwrap().clone()
    }
}

/// Sleeps for `duration`, waking early if the kind is cancelled
///
/// The sleep is decomposed into sub-second slices so a cancellation
/// request is observed within one slice rather than after the full
/// duration.
///
/// # Returns
///
/// * `true` - Cancellation was requested (before or during the sleep)
/// * `false` - The full duration elapsed without cancellation
pub async fn wait_or_cancelled(registry: &CancelRegistry, kind: &str, duration: Duration) -> bool {
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if registry.get(kind) {
            return true;
        }
        let step = remaining.min(SLEEP_SLICE);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
    registry.get(kind)
}
