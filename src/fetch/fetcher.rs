//! Resilient single-request fetch with classified backoff
//!
//! One logical fetch loops over a bounded number of attempts. Failure
//! kinds back off differently: rate limiting (429) and blocking (403)
//! need much longer waits than transient network errors, and a 404 is
//! a definitive answer that is never retried. Every wait is
//! interruptible, so cancellation is observed within one sleep slice.

use crate::cancel::{wait_or_cancelled, CancelRegistry};
use crate::config::FetchConfig;
use crate::fetch::pool::SessionPool;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Terminal status of one logical fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// HTTP 200, body returned
    Ok,
    /// HTTP 404; the resource genuinely does not exist
    NotFound,
    /// Retries exhausted without a definitive answer
    GaveUp,
    /// The job's cancel flag was observed
    Cancelled,
}

/// Outcome of one logical fetch
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub body: String,
    pub status: FetchStatus,
    /// Attempts actually made (0 when cancelled before the first)
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }

    fn empty(status: FetchStatus, attempts: u32) -> Self {
        Self {
            body: String::new(),
            status,
            attempts,
        }
    }
}

/// The fetch seam the orchestrator consumes
///
/// Implemented by [`ResilientFetcher`] in production and by stubs in
/// tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, job_kind: &str) -> FetchOutcome;
}

/// Non-definitive failure kinds, each with its own backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP 429
    RateLimited,
    /// HTTP 403; provoking further blocking is costly
    Blocked,
    /// Network error or unexpected status
    Transient,
}

/// Backoff before retry number `attempt + 1`, without jitter
///
/// Rate-limit and block responses grow exponentially from their
/// configured bases; transient errors grow linearly. The result is
/// capped at `max-delay-secs`.
pub fn base_backoff(class: FailureClass, attempt: u32, config: &FetchConfig) -> Duration {
    let secs = match class {
        FailureClass::RateLimited => {
            config.rate_limit_delay_secs.saturating_mul(1u64 << (attempt - 1).min(10))
        }
        FailureClass::Blocked => {
            config.block_delay_secs.saturating_mul(1u64 << (attempt - 1).min(10))
        }
        FailureClass::Transient => config.error_delay_secs.saturating_mul(attempt as u64),
    };
    Duration::from_secs(secs.min(config.max_delay_secs))
}

/// Backoff with random jitter applied, still capped at `max-delay-secs`
fn backoff_for(class: FailureClass, attempt: u32, config: &FetchConfig) -> Duration {
    let base = base_backoff(class, attempt, config);
    let jitter_cap = (base.as_secs_f64() * 0.5).max(1.0);
    let jitter = rand::thread_rng().gen_range(0.0..jitter_cap);
    let total = base + Duration::from_secs_f64(jitter);
    total.min(config.max_delay())
}

/// Production fetcher: pooled identity-rotating sessions with
/// classified retry/backoff and cooperative cancellation
pub struct ResilientFetcher {
    pool: Arc<SessionPool>,
    cancel: Arc<CancelRegistry>,
    config: FetchConfig,
}

impl ResilientFetcher {
    pub fn new(pool: Arc<SessionPool>, cancel: Arc<CancelRegistry>, config: FetchConfig) -> Self {
        Self {
            pool,
            cancel,
            config,
        }
    }

    /// Issues one attempt, always returning the session to the pool
    async fn attempt(&self, url: &str) -> AttemptResult {
        let session = match self.pool.acquire() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to build HTTP session: {}", e);
                return AttemptResult::Retry(FailureClass::Transient);
            }
        };

        let response = session.get(url).await;
        self.pool.release(session);

        match response {
            Ok(response) => match response.status().as_u16() {
                200 => match response.text().await {
                    Ok(body) => AttemptResult::Success(body),
                    Err(e) => {
                        tracing::warn!("Failed to read body from {}: {}", url, e);
                        AttemptResult::Retry(FailureClass::Transient)
                    }
                },
                404 => AttemptResult::NotFound,
                429 => {
                    tracing::warn!("Rate limited (429) for {}", url);
                    AttemptResult::Retry(FailureClass::RateLimited)
                }
                403 => {
                    tracing::warn!("Forbidden (403) for {}", url);
                    AttemptResult::Retry(FailureClass::Blocked)
                }
                status => {
                    tracing::warn!("HTTP {} for {}", status, url);
                    AttemptResult::Retry(FailureClass::Transient)
                }
            },
            Err(e) => {
                tracing::warn!("Request error for {}: {}", url, e);
                AttemptResult::Retry(FailureClass::Transient)
            }
        }
    }
}

enum AttemptResult {
    Success(String),
    NotFound,
    Retry(FailureClass),
}

#[async_trait]
impl Fetch for ResilientFetcher {
    async fn fetch(&self, url: &str, job_kind: &str) -> FetchOutcome {
        for attempt in 1..=self.config.max_retries {
            if self.cancel.get(job_kind) {
                tracing::info!("Fetch of {} cancelled before attempt {}", url, attempt);
                return FetchOutcome::empty(FetchStatus::Cancelled, attempt - 1);
            }

            tracing::debug!("Fetching {} (attempt {})", url, attempt);
            match self.attempt(url).await {
                AttemptResult::Success(body) => {
                    return FetchOutcome {
                        body,
                        status: FetchStatus::Ok,
                        attempts: attempt,
                    };
                }
                AttemptResult::NotFound => {
                    return FetchOutcome::empty(FetchStatus::NotFound, attempt);
                }
                AttemptResult::Retry(class) => {
                    if attempt < self.config.max_retries {
                        let wait = backoff_for(class, attempt, &self.config);
                        tracing::debug!(
                            "Backing off {:?} after {:?} failure for {}",
                            wait,
                            class,
                            url
                        );
                        if wait_or_cancelled(&self.cancel, job_kind, wait).await {
                            tracing::info!("Fetch of {} cancelled during backoff", url);
                            return FetchOutcome::empty(FetchStatus::Cancelled, attempt);
                        }
                    }
                }
            }
        }

        tracing::error!(
            "Giving up on {} after {} attempts",
            url,
            self.config.max_retries
        );
        FetchOutcome::empty(FetchStatus::GaveUp, self.config.max_retries)
    }
}
