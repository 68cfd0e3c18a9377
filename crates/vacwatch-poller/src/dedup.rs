//! Filtering fetched vacancies against the seen registry.

use tracing::{debug, error, info};

use vacwatch_hh::JobPosting;
use vacwatch_store::SeenRegistry;

/// Keep only postings whose id was never seen, marking them seen.
///
/// Postings without an id are dropped. Input order is preserved, and a
/// duplicate id later in the same batch is dropped too. The registry is
/// saved once, and only when something new was found.
pub async fn filter_new(postings: Vec<JobPosting>, registry: &mut SeenRegistry) -> Vec<JobPosting> {
    if postings.is_empty() {
        return Vec::new();
    }

    let mut fresh = Vec::new();
    for posting in postings {
        let id = posting.id.trim();
        if id.is_empty() {
            debug!(title = ?posting.title, "skipping vacancy without id");
            continue;
        }
        if registry.add(id) {
            fresh.push(posting);
        }
    }

    if fresh.is_empty() {
        info!("no new vacancies");
        return fresh;
    }

    if let Err(e) = registry.save().await {
        error!(error = %e, "failed to save seen vacancies");
    }
    info!(count = fresh.len(), "found new vacancies");
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ids(postings: &[JobPosting]) -> Vec<&str> {
        postings.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn empty_batch_does_not_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut registry = SeenRegistry::load(&path).await;

        let fresh = filter_new(Vec::new(), &mut registry).await;

        assert!(fresh.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn keeps_new_in_order_and_saves_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut registry = SeenRegistry::load(&path).await;
        registry.add("2");

        let batch = vec![
            JobPosting::new("3", "c"),
            JobPosting::new("2", "b"),
            JobPosting::new("1", "a"),
        ];
        let fresh = filter_new(batch, &mut registry).await;

        assert_eq!(ids(&fresh), vec!["3", "1"]);
        let reloaded = SeenRegistry::load(&path).await;
        assert_eq!(reloaded.count(), 3);
    }

    #[tokio::test]
    async fn drops_missing_ids_and_in_batch_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut registry = SeenRegistry::load(&path).await;

        let batch = vec![
            JobPosting::new("", "no id"),
            JobPosting::new("7", "first"),
            JobPosting::new("  ", "blank id"),
            JobPosting::new("7", "again"),
        ];
        let fresh = filter_new(batch, &mut registry).await;

        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].title.as_deref(), Some("first"));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn all_duplicates_skip_the_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut registry = SeenRegistry::load(&path).await;
        registry.add("1");

        let fresh = filter_new(vec![JobPosting::new("1", "a")], &mut registry).await;

        assert!(fresh.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn second_pass_over_same_batch_is_empty() {
        let dir = tempdir().unwrap();
        let mut registry = SeenRegistry::load(dir.path().join("seen.json")).await;
        let batch = vec![JobPosting::new("1", "a"), JobPosting::new("2", "b")];

        let first = filter_new(batch.clone(), &mut registry).await;
        let second = filter_new(batch, &mut registry).await;

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }
}
