//! File-backed per-user state store.
//!
//! Every mutation goes through [`write_json_atomic`]: serialize to a `.tmp`
//! sibling, then `fs::rename` over the live file, so a concurrent reader
//! never observes a partially written file. Reads of externally owned state
//! (registry, user record) degrade to safe defaults; reads of state this
//! engine owns (digest queue) surface corruption as errors so nothing queued
//! is silently lost.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, WatchError};
use crate::settings::UserRecord;
use crate::types::{ChangeSet, Snapshot};

const USER_FILE: &str = "user.json";
const SNAPSHOT_CURRENT: &str = "snapshot-current.json";
const SNAPSHOT_PREVIOUS: &str = "snapshot-previous.json";
const COMPLETED_JOBS: &str = "completed-jobs.json";
const DIGEST_QUEUE: &str = "digest-queue.json";

/// Which of the two per-user snapshots to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSlot {
    Current,
    Previous,
}

impl SnapshotSlot {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Current => SNAPSHOT_CURRENT,
            Self::Previous => SNAPSHOT_PREVIOUS,
        }
    }
}

/// Per-user JSON state under `<root>/users/<user_id>/`.
pub struct UserStore {
    root: PathBuf,
}

impl UserStore {
    /// Create a store rooted at the given data directory.
    pub fn new(root: &Path) -> Self {
        std::fs::create_dir_all(root.join("users")).ok();
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(user_id)
    }

    pub fn digest_queue_path(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join(DIGEST_QUEUE)
    }

    /// All known user ids (directory names), sorted.
    pub fn list_users(&self) -> Vec<String> {
        let mut users: Vec<String> = match std::fs::read_dir(self.users_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list users dir: {e}");
                Vec::new()
            }
        };
        users.sort();
        users
    }

    /// Load a user record. The record is owned by the external user layer;
    /// a missing or corrupt file is a read error for that user's cycle.
    pub fn load_user(&self, user_id: &str) -> Result<UserRecord> {
        let path = self.user_dir(user_id).join(USER_FILE);
        let mut record: UserRecord = read_json(&path)?;
        if record.user_id.is_empty() {
            record.user_id = user_id.to_string();
        }
        Ok(record)
    }

    /// Load one snapshot slot. Missing file is `None` (first capture);
    /// a corrupt file is logged and treated as missing.
    pub fn load_snapshot(&self, user_id: &str, slot: SnapshotSlot) -> Option<Snapshot> {
        let path = self.user_dir(user_id).join(slot.file_name());
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!("Corrupt snapshot {}: {e}", path.display());
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Unreadable snapshot {}: {e}", path.display());
                None
            }
        }
    }

    /// Rotate snapshots: current → previous, `new` → current.
    ///
    /// The new capture lands in a temp file first; only renames touch the
    /// live slots. A failure leaves the previous on-disk state authoritative.
    pub fn rotate_snapshot(&self, user_id: &str, new: &Snapshot) -> Result<()> {
        let dir = self.user_dir(user_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| WatchError::StateWrite(format!("create {}: {e}", dir.display())))?;

        let current = dir.join(SNAPSHOT_CURRENT);
        let previous = dir.join(SNAPSHOT_PREVIOUS);
        let tmp = dir.join(format!("{SNAPSHOT_CURRENT}.tmp"));

        let json = serde_json::to_string_pretty(new)?;
        std::fs::write(&tmp, json)
            .map_err(|e| WatchError::StateWrite(format!("write {}: {e}", tmp.display())))?;

        if current.exists() {
            std::fs::rename(&current, &previous).map_err(|e| {
                WatchError::StateWrite(format!("rotate {}: {e}", current.display()))
            })?;
        }
        std::fs::rename(&tmp, &current)
            .map_err(|e| WatchError::StateWrite(format!("commit {}: {e}", current.display())))?;

        tracing::debug!(
            "💾 Rotated snapshot for {user_id} ({} visits)",
            new.visits.len()
        );
        Ok(())
    }

    /// The externally maintained completed-job registry. Missing or corrupt
    /// means "nothing completed" — the safe default for suppression.
    pub fn completed_jobs(&self, user_id: &str) -> HashSet<String> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Registry {
            #[serde(default)]
            completed_jobs: Vec<String>,
        }

        let path = self.user_dir(user_id).join(COMPLETED_JOBS);
        if !path.exists() {
            return HashSet::new();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Registry>(&content) {
                Ok(registry) => registry.completed_jobs.into_iter().collect(),
                Err(e) => {
                    tracing::warn!("Corrupt completed-job registry {}: {e}", path.display());
                    HashSet::new()
                }
            },
            Err(e) => {
                tracing::warn!("Unreadable completed-job registry {}: {e}", path.display());
                HashSet::new()
            }
        }
    }

    /// Load the pending digest queue. Missing file means an empty queue;
    /// corruption is an error — queued changes must not vanish silently.
    pub fn load_digest_queue(&self, user_id: &str) -> Result<Vec<ChangeSet>> {
        let path = self.digest_queue_path(user_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Persist the digest queue atomically.
    pub fn save_digest_queue(&self, user_id: &str, queue: &[ChangeSet]) -> Result<()> {
        let dir = self.user_dir(user_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| WatchError::StateWrite(format!("create {}: {e}", dir.display())))?;
        write_json_atomic(&self.digest_queue_path(user_id), &queue)
    }

    /// Delete the persisted queue. Called only after confirmed dispatch.
    pub fn delete_digest_queue(&self, user_id: &str) -> Result<()> {
        let path = self.digest_queue_path(user_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WatchError::StateWrite(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Serialize to `<path>.tmp`, then atomically rename over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, json)
        .map_err(|e| WatchError::StateWrite(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| WatchError::StateWrite(format!("commit {}: {e}", path.display())))?;
    Ok(())
}

/// Read and deserialize a JSON file, mapping failures to `StateRead`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WatchError::StateRead(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| WatchError::StateRead(format!("parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeRecord, Visit};

    fn temp_store(tag: &str) -> (PathBuf, UserStore) {
        let dir = std::env::temp_dir().join(format!("visitwatch-store-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        let store = UserStore::new(&dir);
        (dir, store)
    }

    fn visit(id: &str, date: &str) -> Visit {
        Visit {
            id: id.into(),
            store_number: "12".into(),
            store_name: "Store 12".into(),
            location: "Springfield, IL".into(),
            scheduled_date: date.parse().unwrap(),
            dispenser_count: 4,
            extra: Default::default(),
        }
    }

    #[test]
    fn rotation_moves_current_to_previous() {
        let (dir, store) = temp_store("rotate");
        let first = Snapshot::new(vec![visit("W-100", "2025-06-01")]);
        let second = Snapshot::new(vec![visit("W-200", "2025-06-02")]);

        store.rotate_snapshot("u1", &first).unwrap();
        assert!(store.load_snapshot("u1", SnapshotSlot::Previous).is_none());

        store.rotate_snapshot("u1", &second).unwrap();
        let prev = store.load_snapshot("u1", SnapshotSlot::Previous).unwrap();
        let cur = store.load_snapshot("u1", SnapshotSlot::Current).unwrap();
        assert_eq!(prev.visits[0].id, "W-100");
        assert_eq!(cur.visits[0].id, "W-200");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_registry_means_nothing_completed() {
        let (dir, store) = temp_store("registry-missing");
        assert!(store.completed_jobs("nobody").is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_registry_degrades_to_empty() {
        let (dir, store) = temp_store("registry-corrupt");
        let user_dir = store.user_dir("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join(COMPLETED_JOBS), "{not json").unwrap();
        assert!(store.completed_jobs("u1").is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn registry_contents_are_returned() {
        let (dir, store) = temp_store("registry-read");
        let user_dir = store.user_dir("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(
            user_dir.join(COMPLETED_JOBS),
            r#"{ "completedJobs": ["W-100", "W-200"] }"#,
        )
        .unwrap();
        let jobs = store.completed_jobs("u1");
        assert!(jobs.contains("W-100"));
        assert!(jobs.contains("W-200"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn digest_queue_roundtrip_and_delete() {
        let (dir, store) = temp_store("queue");
        let set = ChangeSet::from_records(vec![ChangeRecord::removed(&visit(
            "W-100",
            "2025-06-01",
        ))]);

        assert!(store.load_digest_queue("u1").unwrap().is_empty());
        store.save_digest_queue("u1", &[set.clone()]).unwrap();

        let loaded = store.load_digest_queue("u1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], set);

        // No stray temp file after a successful write.
        assert!(!store.digest_queue_path("u1").with_extension("json.tmp").exists());

        store.delete_digest_queue("u1").unwrap();
        assert!(!store.digest_queue_path("u1").exists());
        // Deleting an absent queue is fine.
        store.delete_digest_queue("u1").unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_queue_is_an_error_not_a_silent_reset() {
        let (dir, store) = temp_store("queue-corrupt");
        let user_dir = store.user_dir("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(store.digest_queue_path("u1"), "[{broken").unwrap();
        assert!(matches!(
            store.load_digest_queue("u1"),
            Err(WatchError::StateRead(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn list_users_returns_sorted_dirs() {
        let (dir, store) = temp_store("list");
        std::fs::create_dir_all(store.user_dir("beta")).unwrap();
        std::fs::create_dir_all(store.user_dir("alpha")).unwrap();
        assert_eq!(store.list_users(), vec!["alpha", "beta"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn user_id_backfilled_from_dir_name() {
        let (dir, store) = temp_store("user-id");
        let user_dir = store.user_dir("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(
            user_dir.join(USER_FILE),
            r#"{ "emailAddress": "crew@example.com" }"#,
        )
        .unwrap();
        let record = store.load_user("u1").unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.email_address, "crew@example.com");
        std::fs::remove_dir_all(&dir).ok();
    }
}
