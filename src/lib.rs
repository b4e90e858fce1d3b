//! Squad-Scout: a resilient roster crawler core
//!
//! This crate implements the long-running crawl subsystem of a roster
//! database editor: identity-rotating HTTP sessions, a retry/backoff
//! fetch layer, a checkpointing crawl orchestrator with cooperative
//! cancellation, and a live progress broadcast hub.

pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod control;
pub mod crawl;
pub mod fetch;
pub mod identity;
pub mod progress;

use thiserror::Error;

/// Main error type for Squad-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint I/O error for {path}: {source}")]
    CheckpointIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Checkpoint format error for {path}: {source}")]
    CheckpointFormat {
        path: String,
        source: serde_json::Error,
    },

    #[error("Target source error: {0}")]
    TargetSource(String),

    #[error("Unknown job kind: {0}")]
    UnknownJob(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Squad-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cancel::CancelRegistry;
pub use checkpoint::{CheckpointStore, CrawlResult, ResultStatus};
pub use config::Config;
pub use control::{JobController, JobStatus, StartOutcome};
pub use crawl::{CrawlTarget, JobOutcome, JobSummary, Orchestrator};
pub use fetch::{Fetch, FetchOutcome, FetchStatus, ResilientFetcher, SessionPool};
pub use progress::{HubMessage, ProgressEvent, ProgressHub, ProgressStatus, Subscription};
