//! Checkpoint persistence for crawl jobs
//!
//! The checkpoint store is the only state that survives a process
//! restart: an upsert-keyed collection of per-target results, written
//! to disk as a sorted JSON array via atomic replace.

mod store;
mod types;

pub use store::CheckpointStore;
pub use types::{CrawlResult, ResultStatus};
