//! On-disk checkpoint store
//!
//! One JSON array per job kind, sorted by target id, rewritten in full
//! via write-to-temp-then-rename so a crash mid-write never corrupts
//! previously committed results.

use crate::checkpoint::types::CrawlResult;
use crate::ScoutError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// In-memory working copy of a job's persisted results
///
/// Keyed by target id, so upserting a new attempt for an id replaces
/// the prior record and iteration order matches the on-disk sort.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    results: BTreeMap<String, CrawlResult>,
}

impl CheckpointStore {
    /// Loads the store from disk
    ///
    /// A missing file yields an empty store. An unparseable file is
    /// logged and treated as empty rather than failing the job; the
    /// run will rebuild it. I/O errors other than not-found propagate.
    pub fn load(path: &Path) -> Result<Self, ScoutError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No checkpoint at {}, starting empty", path.display());
                return Ok(Self {
                    path: path.to_path_buf(),
                    results: BTreeMap::new(),
                });
            }
            Err(e) => {
                return Err(ScoutError::CheckpointIo {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        let results = match serde_json::from_str::<Vec<CrawlResult>>(&content) {
            Ok(list) => {
                tracing::info!(
                    "Loaded {} checkpointed results from {}",
                    list.len(),
                    path.display()
                );
                list.into_iter().map(|r| (r.id.clone(), r)).collect()
            }
            Err(e) => {
                tracing::warn!(
                    "Checkpoint {} is not valid JSON ({}), starting empty",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            results,
        })
    }

    /// Creates an empty store that will persist to `path`
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            results: BTreeMap::new(),
        }
    }

    /// Inserts or replaces the result for its target id
    pub fn upsert(&mut self, result: CrawlResult) {
        self.results.insert(result.id.clone(), result);
    }

    /// Looks up the result for a target id
    pub fn get(&self, id: &str) -> Option<&CrawlResult> {
        self.results.get(id)
    }

    /// Number of results currently held
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterates results in id order
    pub fn results(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.values()
    }

    /// Atomically persists the full store to disk
    ///
    /// Serializes the sorted array to a sibling temp file, then renames
    /// it over the target path. The parent directory is created if
    /// missing. Failures here are job-fatal for callers: continuing
    /// would risk silently losing completed work.
    pub fn persist(&self) -> Result<(), ScoutError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ScoutError::CheckpointIo {
                    path: self.path.display().to_string(),
                    source: e,
                })?;
            }
        }

        let list: Vec<&CrawlResult> = self.results.values().collect();
        let json =
            serde_json::to_string_pretty(&list).map_err(|e| ScoutError::CheckpointFormat {
                path: self.path.display().to_string(),
                source: e,
            })?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|e| ScoutError::CheckpointIo {
            path: tmp_path.display().to_string(),
            source: e,
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| ScoutError::CheckpointIo {
            path: self.path.display().to_string(),
            source: e,
        })?;

        tracing::debug!(
            "Persisted {} results to {}",
            self.results.len(),
            self.path.display()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
