//! Match store: registered social links and their proof artifacts.
//!
//! One JSON object per account per platform at
//! `<root>/accounts/<account>/<platform>.json`, mapping a link to the artifact URLs an
//! operator uploaded for it. Writes go through a temp file and a rename.
//!
//! In-process writers are serialised by a mutex; several processes writing
//! the same root are not supported.

use crate::app_dirs;
use crate::classify::Platform;
use crate::error::{QuestError, Result};
use quest_doc::normalize_link;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Link → proof artifact URLs.
pub type Registry = BTreeMap<String, Vec<String>>;

/// A single stored value may be a bare string in hand-edited files.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredArtifacts {
    Many(Vec<String>),
    One(String),
}

impl From<StoredArtifacts> for Vec<String> {
    fn from(stored: StoredArtifacts) -> Self {
        match stored {
            StoredArtifacts::Many(list) => list,
            StoredArtifacts::One(item) => vec![item],
        }
    }
}

/// Handle to the on-disk registries. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MatchStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl MatchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing file for one account and platform.
    pub fn registry_path(&self, account: &str, platform: Platform) -> PathBuf {
        app_dirs::account_dir(&self.root, account).join(format!("{}.json", platform.as_str()))
    }

    /// Read a whole registry. A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// [`QuestError::Store`] when the file exists but is not a JSON object of
    /// string or string-list values; [`QuestError::Io`] on read failure.
    pub fn load(&self, account: &str, platform: Platform) -> Result<Registry> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_unlocked(account, platform)
    }

    /// Replace a whole registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be serialised or written.
    pub fn save(&self, account: &str, platform: Platform, registry: &Registry) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save_unlocked(account, platform, registry)
    }

    /// Artifacts registered for `link`, matching exactly or after
    /// [`normalize_link`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn lookup(&self, account: &str, platform: Platform, link: &str) -> Result<Option<Vec<String>>> {
        let registry = self.load(account, platform)?;
        Ok(find_key(&registry, link).and_then(|key| registry.get(key).cloned()))
    }

    /// Remove the entry for `link`. Returns whether an entry was removed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`] and [`Self::save`].
    pub fn remove(&self, account: &str, platform: Platform, link: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.load_unlocked(account, platform)?;
        let Some(key) = find_key(&registry, link).cloned() else {
            return Ok(false);
        };
        registry.remove(&key);
        self.save_unlocked(account, platform, &registry)?;
        tracing::debug!(account, platform = %platform, link = %key, "registry entry removed");
        Ok(true)
    }

    /// Add artifacts for `link`, appending to an existing entry for the same
    /// link. Duplicate artifacts are dropped. Returns the stored list.
    ///
    /// # Errors
    ///
    /// [`QuestError::Store`] when `link` is empty or `artifacts` has no
    /// non-empty entry, plus the errors of [`Self::load`] and [`Self::save`].
    pub fn insert(
        &self,
        account: &str,
        platform: Platform,
        link: &str,
        artifacts: &[String],
    ) -> Result<Vec<String>> {
        let link = link.trim();
        if link.is_empty() {
            return Err(QuestError::Store("link must not be empty".into()));
        }
        let additions: Vec<&str> = artifacts
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if additions.is_empty() {
            return Err(QuestError::Store("at least one proof artifact is required".into()));
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.load_unlocked(account, platform)?;
        let key = find_key(&registry, link)
            .cloned()
            .unwrap_or_else(|| link.to_owned());
        let entry = registry.entry(key).or_default();
        for artifact in additions {
            if !entry.iter().any(|a| a == artifact) {
                entry.push(artifact.to_owned());
            }
        }
        let stored = entry.clone();
        self.save_unlocked(account, platform, &registry)?;
        Ok(stored)
    }

    fn load_unlocked(&self, account: &str, platform: Platform) -> Result<Registry> {
        let path = self.registry_path(account, platform);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Registry::new());
        }
        let raw: BTreeMap<String, StoredArtifacts> = serde_json::from_str(&content)
            .map_err(|e| QuestError::Store(format!("{}: {e}", path.display())))?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    fn save_unlocked(&self, account: &str, platform: Platform, registry: &Registry) -> Result<()> {
        let path = self.registry_path(account, platform);
        let json = serde_json::to_string_pretty(registry)
            .map_err(|e| QuestError::Store(format!("cannot serialize registry: {e}")))?;
        write_atomic(&path, &json)
    }
}

/// Exact key first, then any key equal after normalisation.
fn find_key<'a>(registry: &'a Registry, link: &str) -> Option<&'a String> {
    let link = link.trim();
    if let Some((key, _)) = registry.get_key_value(link) {
        return Some(key);
    }
    let wanted = normalize_link(link);
    registry.keys().find(|key| normalize_link(key) == wanted)
}

/// Write `content` to `path` via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("registry"),
        std::process::id()
    );
    let tmp_path = path
        .parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name));

    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Snapshot of every registry for one account, keyed by platform.
pub fn snapshot(store: &MatchStore, account: &str) -> Result<BTreeMap<Platform, Registry>> {
    let mut out = BTreeMap::new();
    for platform in Platform::ALL {
        let registry = store.load(account, platform)?;
        if !registry.is_empty() {
            out.insert(platform, registry);
        }
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
pub(crate) struct RegistryView<'a> {
    pub account: &'a str,
    pub platform: Platform,
    pub entries: &'a Registry,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn store() -> (tempfile::TempDir, MatchStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load("alice", Platform::Twitter).unwrap().is_empty());
        assert_eq!(store.lookup("alice", Platform::Twitter, "http://x/1").unwrap(), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = store();
        let mut registry = Registry::new();
        registry.insert("http://x/1".into(), vec!["urlA".into(), "urlB".into()]);
        registry.insert("https://x.com/reef/status/2".into(), vec!["urlC".into()]);

        store.save("alice", Platform::Twitter, &registry).unwrap();
        assert_eq!(store.load("alice", Platform::Twitter).unwrap(), registry);
        assert!(store.registry_path("alice", Platform::Twitter).ends_with("accounts/alice/twitter.json"));
    }

    #[test]
    fn exact_lookup_and_remove() {
        let (_dir, store) = store();
        let mut registry = Registry::new();
        registry.insert("http://x/1".into(), vec!["urlA".into(), "urlB".into()]);
        store.save("alice", Platform::Tiktok, &registry).unwrap();

        assert_eq!(
            store.lookup("alice", Platform::Tiktok, "http://x/1").unwrap(),
            Some(vec!["urlA".to_owned(), "urlB".to_owned()])
        );
        assert!(store.remove("alice", Platform::Tiktok, "http://x/1").unwrap());
        assert!(!store.remove("alice", Platform::Tiktok, "http://x/1").unwrap());
        assert!(store.load("alice", Platform::Tiktok).unwrap().is_empty());
    }

    #[test]
    fn normalised_lookup_finds_equivalent_link() {
        let (_dir, store) = store();
        store
            .insert(
                "alice",
                Platform::Twitter,
                "https://twitter.com/reef/status/9?s=20",
                &["https://cdn.example/proof.png".to_owned()],
            )
            .unwrap();

        let hit = store
            .lookup("alice", Platform::Twitter, "https://x.com/reef/status/9")
            .unwrap();
        assert_eq!(hit, Some(vec!["https://cdn.example/proof.png".to_owned()]));

        assert!(store
            .remove("alice", Platform::Twitter, "https://x.com/reef/status/9/")
            .unwrap());
        assert!(store.load("alice", Platform::Twitter).unwrap().is_empty());
    }

    #[test]
    fn insert_appends_without_duplicates() {
        let (_dir, store) = store();
        store
            .insert("alice", Platform::Youtube, "https://youtu.be/a", &["p1".to_owned()])
            .unwrap();
        let stored = store
            .insert(
                "alice",
                Platform::Youtube,
                "https://www.youtube.com/watch?v=a",
                &["p1".to_owned(), "p2".to_owned(), "  ".to_owned()],
            )
            .unwrap();
        assert_eq!(stored, vec!["p1".to_owned(), "p2".to_owned()]);
        let registry = store.load("alice", Platform::Youtube).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_key("https://youtu.be/a"));
    }

    #[test]
    fn insert_requires_link_and_artifact() {
        let (_dir, store) = store();
        assert!(store.insert("alice", Platform::Twitter, " ", &["p".to_owned()]).is_err());
        assert!(store.insert("alice", Platform::Twitter, "https://x.com/a", &[]).is_err());
    }

    #[test]
    fn accounts_and_platforms_are_isolated() {
        let (_dir, store) = store();
        store
            .insert("alice", Platform::Twitter, "https://x.com/a", &["p".to_owned()])
            .unwrap();
        assert_eq!(store.lookup("bob", Platform::Twitter, "https://x.com/a").unwrap(), None);
        assert_eq!(store.lookup("alice", Platform::Tiktok, "https://x.com/a").unwrap(), None);
    }

    #[test]
    fn single_string_values_are_accepted() {
        let (_dir, store) = store();
        let path = store.registry_path("alice", Platform::Instagram);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"https://instagram.com/p/1": "https://cdn/p.jpg"}"#).unwrap();
        assert_eq!(
            store.lookup("alice", Platform::Instagram, "https://instagram.com/p/1").unwrap(),
            Some(vec!["https://cdn/p.jpg".to_owned()])
        );
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let (_dir, store) = store();
        let path = store.registry_path("alice", Platform::Twitter);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = store.load("alice", Platform::Twitter).unwrap_err();
        assert!(matches!(err, QuestError::Store(_)));
    }

    #[test]
    fn snapshot_lists_non_empty_platforms() {
        let (_dir, store) = store();
        store
            .insert("alice", Platform::Linkedin, "https://linkedin.com/p/1", &["p".to_owned()])
            .unwrap();
        let all = snapshot(&store, "alice").unwrap();
        assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![Platform::Linkedin]);
    }
}
