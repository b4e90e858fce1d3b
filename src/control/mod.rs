//! Job control surface
//!
//! The seam an outer API layer talks to: register job kinds once at
//! startup, then start, cancel and inspect them by name. A kind runs
//! at most once at a time; starting an already-running kind is
//! reported, not queued.

use crate::cancel::CancelRegistry;
use crate::crawl::{Orchestrator, ParsePayload, TargetSource};
use crate::fetch::Fetch;
use crate::progress::{ProgressEvent, ProgressHub, ProgressStatus};
use crate::config::JobConfig;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The job was spawned
    Started,
    /// This kind already has a live run
    AlreadyRunning,
    /// No job with this kind is registered
    UnknownKind,
}

/// Point-in-time view of one job kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatus {
    pub running: bool,
    pub cancelled: bool,
}

struct JobEntry {
    config: JobConfig,
    source: Arc<dyn TargetSource>,
    parser: Arc<dyn ParsePayload>,
}

/// Registry and lifecycle manager for crawl jobs
pub struct JobController {
    fetcher: Arc<dyn Fetch>,
    cancel: Arc<CancelRegistry>,
    hub: Arc<ProgressHub>,
    jobs: Mutex<HashMap<String, JobEntry>>,
    running: Arc<Mutex<HashSet<String>>>,
}

impl JobController {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        cancel: Arc<CancelRegistry>,
        hub: Arc<ProgressHub>,
    ) -> Self {
        Self {
            fetcher,
            cancel,
            hub,
            jobs: Mutex::new(HashMap::new()),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Registers a job kind with its target source and payload parser
    ///
    /// Registering a kind again replaces the previous entry.
    pub fn register(
        &self,
        config: JobConfig,
        source: Arc<dyn TargetSource>,
        parser: Arc<dyn ParsePayload>,
    ) {
        let kind = config.kind.clone();
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(
            kind.clone(),
            JobEntry {
                config,
                source,
                parser,
            },
        );
        tracing::info!("Registered job kind {}", kind);
    }

    /// Starts a run for a kind, spawning it onto the runtime
    ///
    /// Returns immediately; progress and the terminal outcome are
    /// reported through the hub.
    pub fn start(&self, kind: &str) -> StartOutcome {
        let (config, source, parser) = {
            let jobs = self.jobs.lock().unwrap();
            match jobs.get(kind) {
                Some(entry) => (
                    entry.config.clone(),
                    entry.source.clone(),
                    entry.parser.clone(),
                ),
                None => return StartOutcome::UnknownKind,
            }
        };

        {
            let mut running = self.running.lock().unwrap();
            if running.contains(kind) {
                tracing::info!("Job {} is already running", kind);
                return StartOutcome::AlreadyRunning;
            }
            running.insert(kind.to_string());
        }

        let orchestrator = Orchestrator::new(
            config,
            self.fetcher.clone(),
            parser,
            self.cancel.clone(),
            self.hub.clone(),
        );
        let hub = self.hub.clone();
        let running = self.running.clone();
        let kind = kind.to_string();

        tokio::spawn(async move {
            match source.targets() {
                Ok(targets) => {
                    if let Err(e) = orchestrator.run(targets).await {
                        tracing::error!("Job {} run failed: {}", kind, e);
                    }
                }
                Err(e) => {
                    tracing::error!("Job {} could not load targets: {}", kind, e);
                    let mut event = ProgressEvent::new(&kind, ProgressStatus::Error);
                    event.message = Some(e.to_string());
                    hub.publish(event);
                }
            }
            running.lock().unwrap().remove(&kind);
        });

        StartOutcome::Started
    }

    /// Requests cancellation for a kind; running workers observe the
    /// flag at their next stop point
    ///
    /// Returns `false` for an unregistered kind.
    pub fn cancel(&self, kind: &str) -> bool {
        if !self.jobs.lock().unwrap().contains_key(kind) {
            return false;
        }
        self.cancel.set(kind);
        true
    }

    /// Snapshot of a kind's run state
    pub fn status(&self, kind: &str) -> JobStatus {
        JobStatus {
            running: self.running.lock().unwrap().contains(kind),
            cancelled: self.cancel.get(kind),
        }
    }

    /// Registered job kinds, sorted for stable output
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.jobs.lock().unwrap().keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
