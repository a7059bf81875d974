//! Digest accumulation — the durable per-user queue of pending change sets.
//!
//! Appends are persisted before `accumulate` returns; the queue file is
//! deleted only after the caller confirms dispatch succeeded. A flush that
//! fails mid-way leaves the file untouched, so digest delivery is
//! at-least-once (a duplicate digest on retry is acceptable, a lost one is
//! not).

use std::sync::Arc;

use chrono::Utc;

use visitwatch_core::error::Result;
use visitwatch_core::store::UserStore;
use visitwatch_core::types::{ChangeSet, ChangeSummary};

/// Merge queued change sets into one combined set: records concatenated in
/// queue order, summaries summed. Merging is associative — flushing `[A, B]`
/// equals concatenating the merges of `[A]` and `[B]`.
pub fn merge_change_sets(sets: &[ChangeSet]) -> ChangeSet {
    let mut all_changes = Vec::new();
    let mut summary = ChangeSummary::default();
    for set in sets {
        all_changes.extend(set.all_changes.iter().cloned());
        summary.merge(&set.summary);
    }
    ChangeSet {
        generated_at: Utc::now(),
        all_changes,
        summary,
    }
}

/// Append-only accumulator over the persisted digest queue.
pub struct DigestAccumulator {
    store: Arc<UserStore>,
}

impl DigestAccumulator {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    /// Durably append a change set to the user's queue.
    ///
    /// A corrupt existing queue surfaces as an error rather than being
    /// clobbered — queued changes must never vanish silently.
    pub fn accumulate(&self, user_id: &str, change_set: ChangeSet) -> Result<()> {
        let mut queue = self.store.load_digest_queue(user_id)?;
        queue.push(change_set);
        self.store.save_digest_queue(user_id, &queue)?;
        tracing::debug!("📥 Digest queue for {user_id} now holds {} set(s)", queue.len());
        Ok(())
    }

    /// The merged view of everything pending, or `None` if nothing is
    /// queued. Does not clear anything.
    pub fn pending(&self, user_id: &str) -> Result<Option<ChangeSet>> {
        let queue = self.store.load_digest_queue(user_id)?;
        if queue.is_empty() {
            Ok(None)
        } else {
            Ok(Some(merge_change_sets(&queue)))
        }
    }

    /// Number of queued change sets (0 on any read problem — diagnostic use).
    pub fn depth(&self, user_id: &str) -> usize {
        self.store
            .load_digest_queue(user_id)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// Delete the persisted queue. Call only after the combined report was
    /// dispatched successfully.
    pub fn confirm_flushed(&self, user_id: &str) -> Result<()> {
        self.store.delete_digest_queue(user_id)?;
        tracing::debug!("🧹 Digest queue for {user_id} cleared after dispatch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visitwatch_core::types::{ChangeRecord, Visit};

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

    fn set_of(records: Vec<ChangeRecord>) -> ChangeSet {
        ChangeSet::from_records(records)
    }

    fn temp_accumulator(tag: &str) -> (std::path::PathBuf, DigestAccumulator) {
        let dir = std::env::temp_dir().join(format!("visitwatch-digest-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        let store = Arc::new(UserStore::new(&dir));
        (dir, DigestAccumulator::new(store))
    }

    #[test]
    fn merge_preserves_order_and_sums_counts() {
        let a = set_of(vec![
            ChangeRecord::removed(&visit("W-100", "2025-06-01")),
            ChangeRecord::added(&visit("W-200", "2025-06-02")),
        ]);
        let b = set_of(vec![ChangeRecord::date_changed(
            &visit("W-300", "2025-06-03"),
            "2025-06-05".parse().unwrap(),
        )]);

        let merged = merge_change_sets(&[a.clone(), b.clone()]);
        assert_eq!(merged.all_changes.len(), 3);
        assert_eq!(merged.all_changes[0], a.all_changes[0]);
        assert_eq!(merged.all_changes[1], a.all_changes[1]);
        assert_eq!(merged.all_changes[2], b.all_changes[0]);
        assert_eq!(merged.summary.added, 1);
        assert_eq!(merged.summary.removed, 1);
        assert_eq!(merged.summary.modified, 1);
        assert!(merged.is_consistent());
    }

    #[test]
    fn merge_is_associative() {
        let a = set_of(vec![ChangeRecord::added(&visit("W-1", "2025-06-01"))]);
        let b = set_of(vec![ChangeRecord::removed(&visit("W-2", "2025-06-02"))]);
        let c = set_of(vec![ChangeRecord::added(&visit("W-3", "2025-06-03"))]);

        let left = merge_change_sets(&[merge_change_sets(&[a.clone(), b.clone()]), c.clone()]);
        let right = merge_change_sets(&[a, merge_change_sets(&[b, c])]);
        assert_eq!(left.all_changes, right.all_changes);
        assert_eq!(left.summary, right.summary);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = merge_change_sets(&[]);
        assert!(merged.is_empty());
        assert!(merged.is_consistent());
    }

    #[test]
    fn accumulate_persists_and_pending_merges() {
        let (dir, acc) = temp_accumulator("roundtrip");
        assert!(acc.pending("u1").unwrap().is_none());

        acc.accumulate("u1", set_of(vec![ChangeRecord::added(&visit("W-1", "2025-06-01"))]))
            .unwrap();
        acc.accumulate("u1", set_of(vec![ChangeRecord::removed(&visit("W-2", "2025-06-02"))]))
            .unwrap();

        assert_eq!(acc.depth("u1"), 2);
        let combined = acc.pending("u1").unwrap().unwrap();
        assert_eq!(combined.all_changes.len(), 2);
        assert_eq!(combined.summary.added, 1);
        assert_eq!(combined.summary.removed, 1);

        // Pending does not clear.
        assert_eq!(acc.depth("u1"), 2);

        acc.confirm_flushed("u1").unwrap();
        assert!(acc.pending("u1").unwrap().is_none());
        assert_eq!(acc.depth("u1"), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn queues_are_per_user() {
        let (dir, acc) = temp_accumulator("per-user");
        acc.accumulate("alice", set_of(vec![ChangeRecord::added(&visit("W-1", "2025-06-01"))]))
            .unwrap();
        assert!(acc.pending("bob").unwrap().is_none());
        assert!(acc.pending("alice").unwrap().is_some());
        std::fs::remove_dir_all(&dir).ok();
    }
}
