//! Crawl jobs: targets, backlog ordering, and the run orchestrator

mod backlog;
mod orchestrator;
mod parser;
mod source;

pub use backlog::build_backlog;
pub use orchestrator::{JobOutcome, JobSummary, Orchestrator};
pub use parser::{ParsePayload, RawBodyParser};
pub use source::{JsonFileTargets, TargetSource};

use serde::{Deserialize, Serialize};

/// One unit of crawlable work
///
/// `id` is the stable key results are checkpointed under. A target
/// without a `source_url` is still recorded, as an error, so it shows
/// up in the checkpoint instead of vanishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub source_url: Option<String>,
}
