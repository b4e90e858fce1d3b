//! Configuration module for Squad-Scout
//!
//! Handles loading, parsing, and validating TOML configuration files:
//! the fetch layer's retry/backoff tuning, the progress hub's delivery
//! policy, and one `[[job]]` entry per crawl job kind.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, JobConfig, ProgressConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
