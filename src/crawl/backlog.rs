//! Backlog ordering for a crawl run
//!
//! Previously-failed targets are retried first, never-attempted
//! targets come next, and already-successful targets are refreshed
//! oldest-first. Across runs this gives failed items priority without
//! needing any ordering guarantee elsewhere.

use crate::checkpoint::CheckpointStore;
use crate::crawl::CrawlTarget;

/// Computes the ordered work backlog for a job run
///
/// Input order is preserved within the failed and new groups; the
/// stale group is sorted by oldest `updated_at` first (ties keep input
/// order).
pub fn build_backlog(targets: &[CrawlTarget], store: &CheckpointStore) -> Vec<CrawlTarget> {
    let mut failed = Vec::new();
    let mut fresh = Vec::new();
    let mut stale = Vec::new();

    for target in targets {
        match store.get(&target.id) {
            Some(result) if result.status.is_error() => failed.push(target.clone()),
            Some(result) => stale.push((result.updated_at, target.clone())),
            None => fresh.push(target.clone()),
        }
    }

    stale.sort_by_key(|(updated_at, _)| *updated_at);

    tracing::info!(
        "Backlog: {} failed, {} new, {} stale",
        failed.len(),
        fresh.len(),
        stale.len()
    );

    failed
        .into_iter()
        .chain(fresh)
        .chain(stale.into_iter().map(|(_, target)| target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CrawlResult, ResultStatus};
    use chrono::{Duration, Utc};
    use serde_json::Map;
    use std::path::Path;

    fn target(id: &str) -> CrawlTarget {
        CrawlTarget {
            id: id.to_string(),
            display_name: format!("Team {}", id),
            source_url: Some(format!("https://example.com/club/{}", id)),
        }
    }

    fn result_at(id: &str, status: ResultStatus, age_hours: i64) -> CrawlResult {
        let mut result = CrawlResult::new(id, format!("Team {}", id), Map::new(), status);
        result.updated_at = Utc::now() - Duration::hours(age_hours);
        result
    }

    #[test]
    fn test_empty_store_keeps_input_order() {
        let store = CheckpointStore::empty(Path::new("unused.json"));
        let targets = vec![target("3"), target("1"), target("2")];

        let backlog = build_backlog(&targets, &store);
        let ids: Vec<&str> = backlog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_failed_target_comes_first() {
        // One error result and nine successes: the error target must
        // lead the backlog on the next run
        let mut store = CheckpointStore::empty(Path::new("unused.json"));
        let targets: Vec<CrawlTarget> = (1..=10).map(|i| target(&i.to_string())).collect();

        for i in 1..=10 {
            let status = if i == 7 {
                ResultStatus::Error("HTTP 500".into())
            } else {
                ResultStatus::Success
            };
            store.upsert(result_at(&i.to_string(), status, i));
        }

        let backlog = build_backlog(&targets, &store);
        assert_eq!(backlog.len(), 10);
        assert_eq!(backlog[0].id, "7");
    }

    #[test]
    fn test_new_targets_before_stale() {
        let mut store = CheckpointStore::empty(Path::new("unused.json"));
        store.upsert(result_at("1", ResultStatus::Success, 1));

        let targets = vec![target("1"), target("2")];
        let backlog = build_backlog(&targets, &store);

        let ids: Vec<&str> = backlog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_stale_sorted_oldest_first() {
        let mut store = CheckpointStore::empty(Path::new("unused.json"));
        store.upsert(result_at("a", ResultStatus::Success, 1));
        store.upsert(result_at("b", ResultStatus::Success, 48));
        store.upsert(result_at("c", ResultStatus::Success, 12));

        let targets = vec![target("a"), target("b"), target("c")];
        let backlog = build_backlog(&targets, &store);

        let ids: Vec<&str> = backlog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_not_found_counts_as_stale_not_failed() {
        // A 404 is a definitive answer; it should not jump the queue
        let mut store = CheckpointStore::empty(Path::new("unused.json"));
        store.upsert(result_at("1", ResultStatus::NotFound, 5));

        let targets = vec![target("1"), target("2")];
        let backlog = build_backlog(&targets, &store);

        let ids: Vec<&str> = backlog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }
}
