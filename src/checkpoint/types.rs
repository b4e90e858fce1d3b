use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome status recorded for one crawl target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    NotFound,
    Error(String),
}

impl ResultStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, ResultStatus::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Success)
    }
}

/// Persisted outcome for one crawl target
///
/// The checkpoint store holds at most one `CrawlResult` per `id`; a
/// new attempt replaces the prior record, never appends a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// Opaque target id, stable across runs
    pub id: String,

    /// Human-readable label for the target
    pub display_name: String,

    /// Scraped payload; field names are owned by the site-specific
    /// parser, not by this core
    #[serde(default)]
    pub payload: Map<String, Value>,

    pub status: ResultStatus,

    /// When this result was produced
    pub updated_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Builds a result with the current timestamp
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        payload: Map<String, Value>,
        status: ResultStatus,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            payload,
            status,
            updated_at: Utc::now(),
        }
    }
}
