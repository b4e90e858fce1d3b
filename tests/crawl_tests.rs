//! Integration tests for the crawl orchestrator
//!
//! These use stub fetchers so the tests exercise the run lifecycle,
//! checkpointing and cancellation without any network.

use async_trait::async_trait;
use squad_scout::cancel::{wait_or_cancelled, CancelRegistry};
use squad_scout::checkpoint::CheckpointStore;
use squad_scout::config::{JobConfig, ProgressConfig};
use squad_scout::crawl::{CrawlTarget, JobOutcome, Orchestrator, RawBodyParser};
use squad_scout::fetch::{Fetch, FetchOutcome, FetchStatus};
use squad_scout::progress::{HubMessage, ProgressHub, ProgressStatus};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Always answers 200 with a fixed body
struct OkFetch;

#[async_trait]
impl Fetch for OkFetch {
    async fn fetch(&self, _url: &str, _job_kind: &str) -> FetchOutcome {
        FetchOutcome {
            body: "<html>roster</html>".to_string(),
            status: FetchStatus::Ok,
            attempts: 1,
        }
    }
}

/// Gives up on the configured target ids, succeeds on the rest
struct FlakyFetch {
    fail_ids: HashSet<String>,
}

#[async_trait]
impl Fetch for FlakyFetch {
    async fn fetch(&self, url: &str, _job_kind: &str) -> FetchOutcome {
        let fails = self.fail_ids.iter().any(|id| url.ends_with(id.as_str()));
        if fails {
            FetchOutcome {
                body: String::new(),
                status: FetchStatus::GaveUp,
                attempts: 3,
            }
        } else {
            FetchOutcome {
                body: "ok".to_string(),
                status: FetchStatus::Ok,
                attempts: 1,
            }
        }
    }
}

/// Simulates a long backoff: each fetch waits interruptibly, so a
/// cancel request is observed mid-item
struct SlowFetch {
    cancel: Arc<CancelRegistry>,
}

#[async_trait]
impl Fetch for SlowFetch {
    async fn fetch(&self, _url: &str, job_kind: &str) -> FetchOutcome {
        if wait_or_cancelled(&self.cancel, job_kind, Duration::from_secs(30)).await {
            return FetchOutcome {
                body: String::new(),
                status: FetchStatus::Cancelled,
                attempts: 0,
            };
        }
        FetchOutcome {
            body: "ok".to_string(),
            status: FetchStatus::Ok,
            attempts: 1,
        }
    }
}

fn target(id: &str) -> CrawlTarget {
    CrawlTarget {
        id: id.to_string(),
        display_name: format!("Team {}", id),
        source_url: Some(format!("https://example.com/club/{}", id)),
    }
}

fn job_config(checkpoint_path: &Path, workers: usize) -> JobConfig {
    JobConfig {
        kind: "team-squads".to_string(),
        targets_path: "unused.json".to_string(),
        checkpoint_path: checkpoint_path.display().to_string(),
        workers,
        save_every: 2,
        min_interval_ms: None,
    }
}

fn hub() -> Arc<ProgressHub> {
    // No rate limiting so tests observe every event
    let config = ProgressConfig {
        min_interval_ms: 0,
        ..ProgressConfig::default()
    };
    Arc::new(ProgressHub::new(config, HashMap::new()))
}

fn orchestrator(
    config: JobConfig,
    fetch: Arc<dyn Fetch>,
    cancel: Arc<CancelRegistry>,
    hub: Arc<ProgressHub>,
) -> Orchestrator {
    Orchestrator::new(config, fetch, Arc::new(RawBodyParser), cancel, hub)
}

#[tokio::test]
async fn test_run_completes_and_persists_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");

    let orchestrator = orchestrator(
        job_config(&checkpoint, 2),
        Arc::new(OkFetch),
        Arc::new(CancelRegistry::new()),
        hub(),
    );

    let targets = vec![target("1"), target("2"), target("3")];
    let summary = orchestrator.run(targets).await.unwrap();

    assert_eq!(summary.outcome, JobOutcome::Completed);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.succeeded, 3);

    let store = CheckpointStore::load(&checkpoint).unwrap();
    assert_eq!(store.len(), 3);
    assert!(store.results().all(|r| r.status.is_success()));
}

#[tokio::test]
async fn test_failed_targets_recover_on_next_run() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");
    let cancel = Arc::new(CancelRegistry::new());
    let targets = vec![target("1"), target("2"), target("3")];

    // First run: target 2 exhausts its retries
    let flaky = FlakyFetch {
        fail_ids: HashSet::from(["2".to_string()]),
    };
    let first = orchestrator(
        job_config(&checkpoint, 1),
        Arc::new(flaky),
        cancel.clone(),
        hub(),
    );
    let summary = first.run(targets.clone()).await.unwrap();
    assert_eq!(summary.outcome, JobOutcome::Completed);
    assert_eq!(summary.succeeded, 2);

    let store = CheckpointStore::load(&checkpoint).unwrap();
    assert!(store.get("2").unwrap().status.is_error());

    // Second run: everything succeeds, the old error is replaced
    let second = orchestrator(job_config(&checkpoint, 1), Arc::new(OkFetch), cancel, hub());
    let summary = second.run(targets).await.unwrap();
    assert_eq!(summary.outcome, JobOutcome::Completed);

    let store = CheckpointStore::load(&checkpoint).unwrap();
    assert_eq!(store.len(), 3);
    assert!(store.results().all(|r| r.status.is_success()));
}

#[tokio::test]
async fn test_cancellation_is_observed_promptly() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");
    let cancel = Arc::new(CancelRegistry::new());

    let fetch = Arc::new(SlowFetch {
        cancel: cancel.clone(),
    });
    let orchestrator = orchestrator(job_config(&checkpoint, 1), fetch, cancel.clone(), hub());

    let targets: Vec<CrawlTarget> = (1..=10).map(|i| target(&i.to_string())).collect();

    let flagger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        flagger.set("team-squads");
    });

    let start = Instant::now();
    let summary = orchestrator.run(targets).await.unwrap();

    // Bounded by one sleep slice, not by the 30s stub wait
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.outcome, JobOutcome::Cancelled);
    assert!(summary.completed < 10);

    // Whatever completed before the cancel is on disk
    assert!(CheckpointStore::load(&checkpoint).is_ok());
}

#[tokio::test]
async fn test_missing_source_url_is_recorded_as_error() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");

    let orchestrator = orchestrator(
        job_config(&checkpoint, 1),
        Arc::new(OkFetch),
        Arc::new(CancelRegistry::new()),
        hub(),
    );

    let mut no_url = target("5");
    no_url.source_url = None;
    let summary = orchestrator.run(vec![no_url]).await.unwrap();

    assert_eq!(summary.outcome, JobOutcome::Completed);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.succeeded, 0);

    let store = CheckpointStore::load(&checkpoint).unwrap();
    assert!(store.get("5").unwrap().status.is_error());
}

#[tokio::test]
async fn test_empty_target_list_completes_immediately() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");

    let orchestrator = orchestrator(
        job_config(&checkpoint, 4),
        Arc::new(OkFetch),
        Arc::new(CancelRegistry::new()),
        hub(),
    );

    let summary = orchestrator.run(Vec::new()).await.unwrap();
    assert_eq!(summary.outcome, JobOutcome::Completed);
    assert_eq!(summary.total, 0);
}

#[tokio::test]
async fn test_run_emits_starting_and_exactly_one_terminal_event() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("team_squads.json");
    let hub = hub();
    let mut subscription = hub.subscribe();

    let orchestrator = orchestrator(
        job_config(&checkpoint, 1),
        Arc::new(OkFetch),
        Arc::new(CancelRegistry::new()),
        hub.clone(),
    );
    let summary = orchestrator
        .run(vec![target("1"), target("2")])
        .await
        .unwrap();
    assert_eq!(summary.outcome, JobOutcome::Completed);

    // Drain everything delivered for this run
    let mut statuses = Vec::new();
    loop {
        let received =
            tokio::time::timeout(Duration::from_millis(500), subscription.next()).await;
        match received {
            Ok(Some(HubMessage::Event(event))) => {
                let terminal = event.status.is_terminal();
                statuses.push(event.status);
                if terminal {
                    break;
                }
            }
            Ok(Some(_)) => continue,
            _ => break,
        }
    }

    assert_eq!(statuses.first(), Some(&ProgressStatus::Starting));
    let terminal_count = statuses.iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert_eq!(statuses.last(), Some(&ProgressStatus::Completed));
}
