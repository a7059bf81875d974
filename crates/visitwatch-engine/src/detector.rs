//! The snapshot differ — a pure function from two snapshots to a ChangeSet.
//!
//! Detection performs no I/O and has no failure path: a visit with an
//! unusable identity is excluded from both sides with a diagnostic, never
//! failing the whole comparison.

use std::collections::{HashMap, HashSet};

use visitwatch_core::config::DetectorConfig;
use visitwatch_core::types::{ChangeRecord, ChangeSet, Snapshot, Visit};

/// Detector tuning, resolved from [`DetectorConfig`].
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// Collapse an added/removed pair at the same store into one `swapped`
    /// record when the dates are close.
    pub collapse_swaps: bool,
    /// Maximum days between the removed and added dates for a swap match.
    pub swap_window_days: i64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            collapse_swaps: true,
            swap_window_days: 7,
        }
    }
}

impl From<&DetectorConfig> for DetectorOptions {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            collapse_swaps: config.collapse_swaps,
            swap_window_days: config.swap_window_days,
        }
    }
}

/// Canonical job identity: trimmed, uppercased, with at most one `W-` or
/// `WO-` prefix stripped, so `W-100`, `w-100`, `WO-100` and `100` all name
/// the same job. Returns `None` for an identity that is unusable for
/// matching.
pub fn normalize_job_id(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();
    let stripped = upper
        .strip_prefix("WO-")
        .or_else(|| upper.strip_prefix("W-"))
        .unwrap_or(&upper);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Key a snapshot's visits by canonical identity, preserving capture order.
/// Identity-less and duplicate-identity visits are excluded with a warning.
fn keyed_visits(snapshot: &Snapshot) -> Vec<(String, &Visit)> {
    let mut seen = HashSet::new();
    let mut keyed = Vec::with_capacity(snapshot.visits.len());
    for visit in &snapshot.visits {
        let Some(key) = normalize_job_id(&visit.id) else {
            tracing::warn!(
                "Visit at store {} has no usable job id, excluded from comparison",
                visit.store_number
            );
            continue;
        };
        if !seen.insert(key.clone()) {
            tracing::warn!("Duplicate job id {key} in snapshot, keeping first occurrence");
            continue;
        }
        keyed.push((key, visit));
    }
    keyed
}

/// Compare two snapshots and classify every meaningful difference.
///
/// `is_completed` is consulted with the *canonical* job id for every visit
/// that vanished from the schedule; completed jobs are dropped silently —
/// "finished and closed out" is not "pulled from the schedule".
///
/// Record order: removals (previous-snapshot order), additions
/// (current-snapshot order), date changes (previous-snapshot order), then
/// collapsed swaps in pairing order.
pub fn detect(
    previous: &Snapshot,
    current: &Snapshot,
    is_completed: impl Fn(&str) -> bool,
    options: &DetectorOptions,
) -> ChangeSet {
    let prev_keyed = keyed_visits(previous);
    let cur_keyed = keyed_visits(current);

    let prev_index: HashMap<&str, &Visit> =
        prev_keyed.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let cur_index: HashMap<&str, &Visit> =
        cur_keyed.iter().map(|(k, v)| (k.as_str(), *v)).collect();

    let mut removed: Vec<&Visit> = Vec::new();
    let mut date_changed: Vec<(&Visit, &Visit)> = Vec::new();

    for (key, prev_visit) in &prev_keyed {
        match cur_index.get(key.as_str()) {
            None => {
                if is_completed(key) {
                    tracing::debug!("Job {key} completed, suppressing removal alert");
                } else {
                    removed.push(prev_visit);
                }
            }
            Some(cur_visit) => {
                if prev_visit.scheduled_date != cur_visit.scheduled_date {
                    date_changed.push((prev_visit, cur_visit));
                }
            }
        }
    }

    let mut added: Vec<&Visit> = cur_keyed
        .iter()
        .filter(|(key, _)| !prev_index.contains_key(key.as_str()))
        .map(|(_, v)| *v)
        .collect();

    // Swap collapsing: a removal and an addition at the same store with
    // nearby dates is one rebooking, not two critical alerts. Greedy in
    // detection order; each added visit pairs at most once.
    let mut swaps: Vec<(&Visit, &Visit)> = Vec::new();
    if options.collapse_swaps {
        let mut surviving_removed = Vec::with_capacity(removed.len());
        for removed_visit in removed {
            let matched = added.iter().position(|added_visit| {
                added_visit.store_number == removed_visit.store_number
                    && (added_visit.scheduled_date - removed_visit.scheduled_date)
                        .num_days()
                        .abs()
                        <= options.swap_window_days
            });
            match matched {
                Some(i) => swaps.push((removed_visit, added.remove(i))),
                None => surviving_removed.push(removed_visit),
            }
        }
        removed = surviving_removed;
    }

    let mut records = Vec::new();
    records.extend(removed.iter().map(|v| ChangeRecord::removed(v)));
    records.extend(added.iter().map(|v| ChangeRecord::added(v)));
    records.extend(
        date_changed
            .iter()
            .map(|(old, new)| ChangeRecord::date_changed(old, new.scheduled_date)),
    );
    records.extend(
        swaps
            .iter()
            .map(|(rem, add)| ChangeRecord::swapped(rem, add)),
    );

    ChangeSet::from_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use visitwatch_core::types::Severity;

    fn visit(id: &str, store: &str, date: &str) -> Visit {
        Visit {
            id: id.into(),
            store_number: store.into(),
            store_name: format!("Store {store}"),
            location: "Springfield, IL".into(),
            scheduled_date: date.parse().unwrap(),
            dispenser_count: 4,
            extra: Default::default(),
        }
    }

    fn snapshot(visits: Vec<Visit>) -> Snapshot {
        Snapshot::new(visits)
    }

    fn never_completed(_: &str) -> bool {
        false
    }

    #[test]
    fn vanished_visit_is_removed_critical() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.removed, 1);
        assert_eq!(set.all_changes.len(), 1);
        assert_eq!(set.all_changes[0].severity(), Severity::Critical);
        assert!(matches!(
            &set.all_changes[0],
            ChangeRecord::Removed { job_id, .. } if job_id == "W-100"
        ));
    }

    #[test]
    fn completed_job_suppresses_removal() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![]);
        let set = detect(&prev, &cur, |id| id == "100", &DetectorOptions::default());
        assert!(set.is_empty());
        assert_eq!(set.summary.total(), 0);
    }

    #[test]
    fn new_visit_is_added_critical() {
        let prev = snapshot(vec![]);
        let cur = snapshot(vec![visit("W-300", "7", "2025-06-10")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.added, 1);
        assert_eq!(set.all_changes[0].severity(), Severity::Critical);
    }

    #[test]
    fn moved_date_is_reported_with_both_dates() {
        let prev = snapshot(vec![visit("W-200", "5", "2025-06-01")]);
        let cur = snapshot(vec![visit("W-200", "5", "2025-06-03")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.modified, 1);
        match &set.all_changes[0] {
            ChangeRecord::DateChanged {
                old_date, new_date, ..
            } => {
                assert_eq!(old_date.to_string(), "2025-06-01");
                assert_eq!(new_date.to_string(), "2025-06-03");
            }
            other => panic!("expected date change, got {other:?}"),
        }
        assert_eq!(set.all_changes[0].severity(), Severity::High);
    }

    #[test]
    fn non_date_field_drift_is_not_reported() {
        let prev = snapshot(vec![visit("W-200", "5", "2025-06-01")]);
        let mut changed = visit("W-200", "5", "2025-06-01");
        changed.store_name = "Store 5 (rebranded)".into();
        changed.dispenser_count = 9;
        let cur = snapshot(vec![changed]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert!(set.is_empty());
    }

    #[test]
    fn identical_snapshots_yield_empty_set() {
        let visits = vec![
            visit("W-100", "12", "2025-06-01"),
            visit("W-200", "5", "2025-06-03"),
        ];
        let prev = snapshot(visits.clone());
        let cur = snapshot(visits);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert!(set.is_empty());
    }

    #[test]
    fn prefixed_and_unprefixed_ids_match() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![visit("100", "12", "2025-06-01")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert!(set.is_empty());

        let cur_lower = snapshot(vec![visit("w-100", "12", "2025-06-01")]);
        let set = detect(&prev, &cur_lower, never_completed, &DetectorOptions::default());
        assert!(set.is_empty());

        let cur_wo = snapshot(vec![visit("WO-100", "12", "2025-06-01")]);
        let set = detect(&prev, &cur_wo, never_completed, &DetectorOptions::default());
        assert!(set.is_empty());
    }

    #[test]
    fn identity_less_visit_is_excluded_not_fatal() {
        let prev = snapshot(vec![visit("  ", "12", "2025-06-01"), visit("W-200", "5", "2025-06-02")]);
        let cur = snapshot(vec![visit("W-200", "5", "2025-06-02")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        // The blank-id visit is not reported as removed.
        assert!(set.is_empty());
    }

    #[test]
    fn rebooked_visit_collapses_to_swap() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![visit("W-450", "12", "2025-06-04")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.swapped, 1);
        assert_eq!(set.summary.added, 0);
        assert_eq!(set.summary.removed, 0);
        match &set.all_changes[0] {
            ChangeRecord::Swapped {
                removed_job_id,
                added_job_id,
                old_date,
                new_date,
                ..
            } => {
                assert_eq!(removed_job_id, "W-100");
                assert_eq!(added_job_id, "W-450");
                assert_eq!(old_date.to_string(), "2025-06-01");
                assert_eq!(new_date.to_string(), "2025-06-04");
            }
            other => panic!("expected swap, got {other:?}"),
        }
        assert_eq!(set.all_changes[0].severity(), Severity::High);
    }

    #[test]
    fn distant_dates_do_not_swap() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![visit("W-450", "12", "2025-07-15")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.swapped, 0);
        assert_eq!(set.summary.added, 1);
        assert_eq!(set.summary.removed, 1);
    }

    #[test]
    fn swap_collapsing_can_be_disabled() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![visit("W-450", "12", "2025-06-04")]);
        let options = DetectorOptions {
            collapse_swaps: false,
            ..Default::default()
        };
        let set = detect(&prev, &cur, never_completed, &options);
        assert_eq!(set.summary.swapped, 0);
        assert_eq!(set.summary.added, 1);
        assert_eq!(set.summary.removed, 1);
    }

    #[test]
    fn different_store_never_swaps() {
        let prev = snapshot(vec![visit("W-100", "12", "2025-06-01")]);
        let cur = snapshot(vec![visit("W-450", "13", "2025-06-01")]);
        let set = detect(&prev, &cur, never_completed, &DetectorOptions::default());
        assert_eq!(set.summary.swapped, 0);
        assert_eq!(set.summary.added, 1);
        assert_eq!(set.summary.removed, 1);
    }

    #[test]
    fn every_output_is_conservation_consistent() {
        let prev = snapshot(vec![
            visit("W-100", "12", "2025-06-01"),
            visit("W-200", "5", "2025-06-02"),
            visit("W-300", "9", "2025-06-03"),
        ]);
        let cur = snapshot(vec![
            visit("W-200", "5", "2025-06-08"),
            visit("W-900", "12", "2025-06-02"),
            visit("W-901", "44", "2025-06-20"),
        ]);
        let set = detect(&prev, &cur, |id| id == "300", &DetectorOptions::default());
        assert!(set.is_consistent());
        // W-100 ↔ W-900 swap at store 12, W-200 date change, W-300 suppressed,
        // W-901 added.
        assert_eq!(set.summary.swapped, 1);
        assert_eq!(set.summary.modified, 1);
        assert_eq!(set.summary.added, 1);
        assert_eq!(set.summary.removed, 0);
    }

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_job_id("W-100"), Some("100".into()));
        assert_eq!(normalize_job_id("wo-100"), Some("100".into()));
        assert_eq!(normalize_job_id("  100  "), Some("100".into()));
        assert_eq!(normalize_job_id("w-abc12"), Some("ABC12".into()));
        assert_eq!(normalize_job_id(""), None);
        assert_eq!(normalize_job_id("   "), None);
        assert_eq!(normalize_job_id("W-"), None);
    }
}
