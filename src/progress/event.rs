use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle status carried by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Starting,
    Processing,
    Cancelled,
    Completed,
    Error,
}

impl ProgressStatus {
    /// Terminal statuses end a job run; observers can stop rendering
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Cancelled | ProgressStatus::Completed | ProgressStatus::Error
        )
    }
}

/// One immutable snapshot of a running job, fanned out to observers
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_kind: String,
    pub current: u64,
    pub total: u64,
    pub item_id: String,
    pub item_label: String,
    pub status: ProgressStatus,
    pub percentage: f64,
    /// Running count of successfully processed items
    pub succeeded: u64,
    pub estimated_time_remaining: Option<String>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Unique per event, for observer-side deduplication and debugging
    pub message_id: Uuid,
}

impl ProgressEvent {
    /// Creates an event with zeroed counters; callers fill in what
    /// they know
    pub fn new(job_kind: &str, status: ProgressStatus) -> Self {
        Self {
            job_kind: job_kind.to_string(),
            current: 0,
            total: 0,
            item_id: String::new(),
            item_label: String::new(),
            status,
            percentage: 0.0,
            succeeded: 0,
            estimated_time_remaining: None,
            message: None,
            timestamp: Utc::now(),
            message_id: Uuid::new_v4(),
        }
    }
}

/// Formats a duration in seconds into a short human-readable string
pub fn format_eta(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
