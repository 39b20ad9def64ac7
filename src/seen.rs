//! Per-account set of quest ids that have already been acted on.

use crate::error::{QuestError, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// File name of the persisted seen set inside an account directory.
pub const SEEN_FILE: &str = "seen.json";

/// Quest ids already dispatched for one account.
///
/// When backed by a file, every change is written through so the set
/// survives restarts. Write failures are logged and the in-memory set stays
/// authoritative for the rest of the process lifetime.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<String>,
    path: Option<PathBuf>,
}

impl SeenSet {
    /// A set that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the set persisted at `path`, or start empty if the file is missing.
    ///
    /// # Errors
    ///
    /// [`QuestError::Store`] if the file exists but is not a JSON string array.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashSet::new(),
            Ok(content) => serde_json::from_str::<HashSet<String>>(&content)
                .map_err(|e| QuestError::Store(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            ids,
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.ids.contains(quest_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Mark `quest_id` seen. Returns `false` if it already was.
    pub fn insert(&mut self, quest_id: &str) -> bool {
        let added = self.ids.insert(quest_id.to_owned());
        if added {
            self.persist();
        }
        added
    }

    /// Forget `quest_id` so the next poll can rediscover it.
    pub fn remove(&mut self, quest_id: &str) -> bool {
        let removed = self.ids.remove(quest_id);
        if removed {
            self.persist();
        }
        removed
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let sorted: BTreeSet<&String> = self.ids.iter().collect();
        let result = serde_json::to_string(&sorted)
            .map_err(QuestError::from)
            .and_then(|json| crate::store::write_atomic(path, &json));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), "failed to persist seen set: {e}");
        }
    }
}
