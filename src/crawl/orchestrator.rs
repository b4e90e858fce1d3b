//! Crawl job orchestration
//!
//! Drives one job run through its lifecycle:
//! `Starting -> Running -> {Completed | Cancelled | Failed}`. A small
//! worker pool drains the backlog concurrently; every completion is
//! upserted into a shared working copy of the checkpoint store, which
//! is persisted incrementally and once more at the end. One item
//! failing never fails the job; failing to persist the checkpoint
//! does, because the job's invariants can no longer be trusted.

use crate::cancel::CancelRegistry;
use crate::checkpoint::{CheckpointStore, CrawlResult, ResultStatus};
use crate::config::JobConfig;
use crate::crawl::backlog::build_backlog;
use crate::crawl::parser::ParsePayload;
use crate::crawl::CrawlTarget;
use crate::fetch::{Fetch, FetchStatus};
use crate::progress::{format_eta, ProgressEvent, ProgressHub, ProgressStatus};
use crate::Result;
use serde_json::Map;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;

/// Terminal state of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Final counts for a finished run
///
/// Lives only as a return value; all in-memory job state is discarded
/// once the run ends. The checkpoint store is what survives.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub kind: String,
    pub outcome: JobOutcome,
    pub total: u64,
    pub completed: u64,
    pub succeeded: u64,
}

/// Runs crawl jobs for one configured job kind
pub struct Orchestrator {
    config: JobConfig,
    fetcher: Arc<dyn Fetch>,
    parser: Arc<dyn ParsePayload>,
    cancel: Arc<CancelRegistry>,
    hub: Arc<ProgressHub>,
}

/// State shared by the workers of one run
struct RunContext {
    config: JobConfig,
    fetcher: Arc<dyn Fetch>,
    parser: Arc<dyn ParsePayload>,
    cancel: Arc<CancelRegistry>,
    hub: Arc<ProgressHub>,
    store: Mutex<CheckpointStore>,
    queue: Mutex<VecDeque<CrawlTarget>>,
    total: u64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    /// Set when checkpoint persistence fails; stops all workers
    fatal: Mutex<Option<String>>,
    started: Instant,
}

impl Orchestrator {
    pub fn new(
        config: JobConfig,
        fetcher: Arc<dyn Fetch>,
        parser: Arc<dyn ParsePayload>,
        cancel: Arc<CancelRegistry>,
        hub: Arc<ProgressHub>,
    ) -> Self {
        Self {
            config,
            fetcher,
            parser,
            cancel,
            hub,
        }
    }

    /// Runs one job to a terminal state
    ///
    /// Exactly one terminal event is published in every case, so
    /// observers never see a run silently end. Returns `Err` only when
    /// the checkpoint cannot even be read; everything else is reported
    /// through the summary's outcome.
    pub async fn run(&self, targets: Vec<CrawlTarget>) -> Result<JobSummary> {
        let kind = self.config.kind.clone();
        tracing::info!("Starting job {}", kind);

        // Starting: fresh cancel flag, prior checkpoint, ordered backlog
        self.cancel.reset(&kind);

        let store = match CheckpointStore::load(Path::new(&self.config.checkpoint_path)) {
            Ok(store) => store,
            Err(e) => {
                self.emit_fatal(&kind, 0, &e.to_string());
                return Err(e);
            }
        };

        let backlog = build_backlog(&targets, &store);
        let total = backlog.len() as u64;

        let mut starting = ProgressEvent::new(&kind, ProgressStatus::Starting);
        starting.total = total;
        starting.message = Some(format!("Processing {} targets", total));
        self.hub.publish(starting);

        if backlog.is_empty() {
            tracing::info!("Job {}: nothing to process", kind);
            let mut done = ProgressEvent::new(&kind, ProgressStatus::Completed);
            done.percentage = 100.0;
            done.message = Some("No targets to process".to_string());
            self.hub.publish(done);
            return Ok(JobSummary {
                kind,
                outcome: JobOutcome::Completed,
                total: 0,
                completed: 0,
                succeeded: 0,
            });
        }

        // Running: bounded worker pool drains the shared queue
        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            parser: self.parser.clone(),
            cancel: self.cancel.clone(),
            hub: self.hub.clone(),
            store: Mutex::new(store),
            queue: Mutex::new(backlog.into_iter().collect()),
            total,
            completed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            fatal: Mutex::new(None),
            started: Instant::now(),
        });

        let workers = self.config.workers.min(ctx.total as usize).max(1);
        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let ctx = ctx.clone();
            pool.spawn(run_worker(ctx));
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Job {}: worker panicked: {}", kind, e);
            }
        }

        // Terminal: persist whatever completed, then exactly one
        // summary event
        let mut fatal = ctx.fatal.lock().unwrap().take();
        if fatal.is_none() {
            if let Err(e) = ctx.store.lock().unwrap().persist() {
                fatal = Some(e.to_string());
            }
        }

        let completed = ctx.completed.load(Ordering::Relaxed);
        let succeeded = ctx.succeeded.load(Ordering::Relaxed);

        let outcome = if let Some(reason) = fatal {
            tracing::error!("Job {} failed: {}", kind, reason);
            self.emit_fatal(&kind, completed, &reason);
            JobOutcome::Failed
        } else if self.cancel.get(&kind) {
            tracing::info!(
                "Job {} cancelled at {}/{} targets",
                kind,
                completed,
                total
            );
            let mut event = ProgressEvent::new(&kind, ProgressStatus::Cancelled);
            event.current = completed;
            event.total = total;
            event.succeeded = succeeded;
            event.percentage = percentage(completed, total);
            event.message = Some("Cancelled by request".to_string());
            self.hub.publish(event);
            JobOutcome::Cancelled
        } else {
            tracing::info!(
                "Job {} completed: {} targets, {} succeeded",
                kind,
                completed,
                succeeded
            );
            let mut event = ProgressEvent::new(&kind, ProgressStatus::Completed);
            event.current = completed;
            event.total = total;
            event.succeeded = succeeded;
            event.percentage = 100.0;
            event.estimated_time_remaining = Some("0s".to_string());
            event.message = Some(format!(
                "Finished: {} targets, {} succeeded",
                completed, succeeded
            ));
            self.hub.publish(event);
            JobOutcome::Completed
        };

        Ok(JobSummary {
            kind,
            outcome,
            total,
            completed,
            succeeded,
        })
    }

    fn emit_fatal(&self, kind: &str, completed: u64, reason: &str) {
        let mut event = ProgressEvent::new(kind, ProgressStatus::Error);
        event.current = completed;
        event.message = Some(reason.to_string());
        self.hub.publish(event);
    }
}

/// One worker: pull, fetch, parse, record, report, repeat
async fn run_worker(ctx: Arc<RunContext>) {
    let kind = ctx.config.kind.clone();

    loop {
        // Cooperative stop points, checked before taking new work
        if ctx.cancel.get(&kind) {
            tracing::debug!("Worker observed cancel flag for {}", kind);
            break;
        }
        if ctx.fatal.lock().unwrap().is_some() {
            break;
        }

        let target = match ctx.queue.lock().unwrap().pop_front() {
            Some(target) => target,
            None => break,
        };

        let result = process_target(&ctx, &kind, &target).await;
        let Some(result) = result else {
            // Fetch observed cancellation mid-item; nothing recorded
            break;
        };

        let succeeded_now = result.status.is_success();
        let item_id = result.id.clone();
        let item_label = result.display_name.clone();
        let error_reason = match &result.status {
            ResultStatus::Error(reason) => Some(reason.clone()),
            _ => None,
        };

        // Record under the store lock; persist every save-every items
        let (completed, succeeded) = {
            let mut store = ctx.store.lock().unwrap();
            store.upsert(result);

            let completed = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
            let succeeded = if succeeded_now {
                ctx.succeeded.fetch_add(1, Ordering::Relaxed) + 1
            } else {
                ctx.succeeded.load(Ordering::Relaxed)
            };

            if completed % ctx.config.save_every as u64 == 0 {
                if let Err(e) = store.persist() {
                    tracing::error!("Job {}: checkpoint persist failed: {}", kind, e);
                    *ctx.fatal.lock().unwrap() = Some(e.to_string());
                    break;
                }
            }
            (completed, succeeded)
        };

        let mut event = ProgressEvent::new(&kind, ProgressStatus::Processing);
        event.current = completed;
        event.total = ctx.total;
        event.item_id = item_id;
        event.item_label = item_label;
        event.succeeded = succeeded;
        event.percentage = percentage(completed, ctx.total);
        event.estimated_time_remaining = Some(estimate_remaining(
            ctx.started.elapsed().as_secs_f64(),
            completed,
            ctx.total,
        ));
        event.message = error_reason;
        ctx.hub.publish(event);
    }
}

/// Fetches and parses one target; `None` means cancellation was
/// observed and nothing should be recorded
async fn process_target(
    ctx: &RunContext,
    kind: &str,
    target: &CrawlTarget,
) -> Option<CrawlResult> {
    let Some(url) = target.source_url.as_deref() else {
        tracing::warn!("Target {} has no source URL", target.id);
        return Some(CrawlResult::new(
            &target.id,
            &target.display_name,
            Map::new(),
            ResultStatus::Error("missing source URL".to_string()),
        ));
    };

    let outcome = ctx.fetcher.fetch(url, kind).await;
    let status = match outcome.status {
        FetchStatus::Cancelled => return None,
        FetchStatus::Ok => match ctx.parser.parse(target, &outcome.body) {
            Ok(payload) => {
                return Some(CrawlResult::new(
                    &target.id,
                    &target.display_name,
                    payload,
                    ResultStatus::Success,
                ));
            }
            Err(reason) => {
                tracing::warn!("Parse failed for {}: {}", target.id, reason);
                ResultStatus::Error(format!("parse error: {}", reason))
            }
        },
        FetchStatus::NotFound => ResultStatus::NotFound,
        FetchStatus::GaveUp => ResultStatus::Error(format!(
            "gave up after {} attempts",
            outcome.attempts
        )),
    };

    Some(CrawlResult::new(
        &target.id,
        &target.display_name,
        Map::new(),
        status,
    ))
}

fn percentage(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (completed as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Moving-average ETA: average seconds per completed item times the
/// items left
fn estimate_remaining(elapsed_secs: f64, completed: u64, total: u64) -> String {
    if completed == 0 {
        return "unknown".to_string();
    }
    let per_item = elapsed_secs / completed as f64;
    format_eta(per_item * total.saturating_sub(completed) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 100.0);
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(10.0, 0, 10), "unknown");
        // 2s per item, 8 left
        assert_eq!(estimate_remaining(4.0, 2, 10), "16s");
        assert_eq!(estimate_remaining(4.0, 10, 10), "0s");
    }
}
