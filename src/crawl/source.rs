use crate::crawl::CrawlTarget;
use crate::{ScoutError, Result};
use std::path::{Path, PathBuf};

/// Supplies the crawl targets for a job kind
///
/// The entity list is owned by whatever feature triggers the job; this
/// core only requires stable target ids.
pub trait TargetSource: Send + Sync {
    fn targets(&self) -> Result<Vec<CrawlTarget>>;
}

/// Reads a JSON array of targets from a file on disk
pub struct JsonFileTargets {
    path: PathBuf,
}

impl JsonFileTargets {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TargetSource for JsonFileTargets {
    fn targets(&self) -> Result<Vec<CrawlTarget>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ScoutError::TargetSource(format!(
                "failed to read targets file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut targets: Vec<CrawlTarget> = serde_json::from_str(&content).map_err(|e| {
            ScoutError::TargetSource(format!(
                "targets file {} is not a valid target list: {}",
                self.path.display(),
                e
            ))
        })?;

        // An unparseable URL would only burn fetch retries; clear it so
        // the target is recorded as an error straight away
        for target in &mut targets {
            if let Some(raw) = target.source_url.as_deref() {
                if url::Url::parse(raw).is_err() {
                    tracing::warn!("Target {} has invalid URL {:?}", target.id, raw);
                    target.source_url = None;
                }
            }
        }

        tracing::info!(
            "Loaded {} targets from {}",
            targets.len(),
            self.path.display()
        );
        Ok(targets)
    }
}
