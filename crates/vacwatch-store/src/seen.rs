//! Registry of vacancy ids that were already delivered.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::fs;
use tracing::{error, info};

use crate::StoreError;
use crate::persist::write_json_atomic;

/// Set of seen vacancy ids backed by a JSON array on disk.
///
/// `add` only touches memory. Callers batch several adds and then call
/// [`SeenRegistry::save`] once; adds made since the last save are lost on a
/// crash, which at worst re-delivers a few vacancies.
#[derive(Debug)]
pub struct SeenRegistry {
    path: PathBuf,
    ids: HashSet<String>,
}

impl SeenRegistry {
    /// Load the registry from `path`. Unreadable data yields an empty set.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let ids = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(ids) => {
                    info!(count = ids.len(), "loaded seen vacancies");
                    ids.into_iter().collect()
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to parse seen vacancies");
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read seen vacancies");
                HashSet::new()
            }
        };

        Self { path, ids }
    }

    /// Insert `id`, returning `true` if it was not seen before.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Forget every id and persist the empty set.
    pub async fn clear(&mut self) {
        self.ids.clear();
        if let Err(e) = self.save().await {
            error!(path = %self.path.display(), error = %e, "failed to save cleared registry");
        }
        info!("seen vacancy registry cleared");
    }

    /// Write the full set to disk, sorted for stable diffs.
    pub async fn save(&self) -> Result<(), StoreError> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        write_json_atomic(&self.path, &ids).await
    }
}
