//! Fetch layer: pooled sessions and resilient requests
//!
//! This module contains the outbound HTTP machinery:
//! - A bounded pool of cookie-carrying sessions with fingerprint
//!   rotation on every loan
//! - A retry/backoff fetcher that classifies failures (rate limited,
//!   blocked, transient) and observes cancellation inside its waits

mod fetcher;
mod pool;

pub use fetcher::{base_backoff, FailureClass, Fetch, FetchOutcome, FetchStatus, ResilientFetcher};
pub use pool::{Session, SessionPool};
