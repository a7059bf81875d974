//! The snapshot/change data model.
//!
//! A [`Snapshot`] is the full set of scheduled visits captured for one user
//! at one instant. Comparing two snapshots yields a [`ChangeSet`]: an
//! ordered list of [`ChangeRecord`]s plus summary counts. Change sets are
//! terminal — once built they are dispatched or queued, never mutated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled work order at a store location. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Job identity as scraped (canonicalized for matching, see the detector).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub store_number: String,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub location: String,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub dispenser_count: u32,
    /// Scraper fields this engine does not interpret; preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The full set of visits captured for one user at one instant.
///
/// Exactly two exist per user: `previous` and `current`. A new capture
/// replaces them wholesale (current → previous, new → current).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub visits: Vec<Visit>,
}

impl Snapshot {
    pub fn new(visits: Vec<Visit>) -> Self {
        Self {
            captured_at: Utc::now(),
            visits,
        }
    }
}

/// How operationally urgent a change is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Date moved or visit rebooked under a new job id.
    High,
    /// Visit appeared on or vanished from the schedule.
    Critical,
}

/// The four classified difference kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    DateChanged,
    Swapped,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::DateChanged => "date_changed",
            Self::Swapped => "swapped",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified difference between two snapshots.
///
/// A closed tagged variant: each kind carries exactly the visit fields the
/// renderer needs, nothing optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeRecord {
    #[serde(rename_all = "camelCase")]
    Added {
        job_id: String,
        store_number: String,
        store_name: String,
        location: String,
        scheduled_date: NaiveDate,
        dispenser_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        job_id: String,
        store_number: String,
        store_name: String,
        location: String,
        scheduled_date: NaiveDate,
        dispenser_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    DateChanged {
        job_id: String,
        store_number: String,
        store_name: String,
        location: String,
        old_date: NaiveDate,
        new_date: NaiveDate,
    },
    /// An added/removed pair at the same store collapsed into one record:
    /// the visit was rebooked under a new job id.
    #[serde(rename_all = "camelCase")]
    Swapped {
        store_number: String,
        store_name: String,
        location: String,
        removed_job_id: String,
        added_job_id: String,
        old_date: NaiveDate,
        new_date: NaiveDate,
    },
}

impl ChangeRecord {
    pub fn added(v: &Visit) -> Self {
        Self::Added {
            job_id: v.id.clone(),
            store_number: v.store_number.clone(),
            store_name: v.store_name.clone(),
            location: v.location.clone(),
            scheduled_date: v.scheduled_date,
            dispenser_count: v.dispenser_count,
        }
    }

    pub fn removed(v: &Visit) -> Self {
        Self::Removed {
            job_id: v.id.clone(),
            store_number: v.store_number.clone(),
            store_name: v.store_name.clone(),
            location: v.location.clone(),
            scheduled_date: v.scheduled_date,
            dispenser_count: v.dispenser_count,
        }
    }

    pub fn date_changed(old: &Visit, new_date: NaiveDate) -> Self {
        Self::DateChanged {
            job_id: old.id.clone(),
            store_number: old.store_number.clone(),
            store_name: old.store_name.clone(),
            location: old.location.clone(),
            old_date: old.scheduled_date,
            new_date,
        }
    }

    pub fn swapped(removed: &Visit, added: &Visit) -> Self {
        Self::Swapped {
            store_number: removed.store_number.clone(),
            store_name: removed.store_name.clone(),
            location: removed.location.clone(),
            removed_job_id: removed.id.clone(),
            added_job_id: added.id.clone(),
            old_date: removed.scheduled_date,
            new_date: added.scheduled_date,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Removed { .. } => ChangeKind::Removed,
            Self::DateChanged { .. } => ChangeKind::DateChanged,
            Self::Swapped { .. } => ChangeKind::Swapped,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Added { .. } | Self::Removed { .. } => Severity::Critical,
            Self::DateChanged { .. } | Self::Swapped { .. } => Severity::High,
        }
    }
}

/// Per-kind record counts. Wire name for date changes is `modified`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    #[serde(default)]
    pub added: usize,
    #[serde(default)]
    pub removed: usize,
    #[serde(default)]
    pub modified: usize,
    #[serde(default)]
    pub swapped: usize,
}

impl ChangeSummary {
    /// Count one record into the summary.
    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Added => self.added += 1,
            ChangeKind::Removed => self.removed += 1,
            ChangeKind::DateChanged => self.modified += 1,
            ChangeKind::Swapped => self.swapped += 1,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &ChangeSummary) {
        self.added += other.added;
        self.removed += other.removed;
        self.modified += other.modified;
        self.swapped += other.swapped;
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified + self.swapped
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} date-changed, {} swapped",
            self.added, self.removed, self.modified, self.swapped
        )
    }
}

/// A batch of change records from one detection cycle (or, after a digest
/// merge, several cycles).
///
/// Record order is detection order. Invariant: `summary` counts always equal
/// the per-kind record counts in `all_changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(rename = "timestamp")]
    pub generated_at: DateTime<Utc>,
    pub all_changes: Vec<ChangeRecord>,
    pub summary: ChangeSummary,
}

impl ChangeSet {
    /// Build a change set from records, deriving the summary.
    pub fn from_records(all_changes: Vec<ChangeRecord>) -> Self {
        let mut summary = ChangeSummary::default();
        for record in &all_changes {
            summary.record(record.kind());
        }
        Self {
            generated_at: Utc::now(),
            all_changes,
            summary,
        }
    }

    /// An empty change set — callers treat this as a no-op, not an error.
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.all_changes.is_empty()
    }

    /// Conservation check: summary counts match the record list.
    pub fn is_consistent(&self) -> bool {
        let mut expected = ChangeSummary::default();
        for record in &self.all_changes {
            expected.record(record.kind());
        }
        expected == self.summary && self.summary.total() == self.all_changes.len()
    }

    /// Highest severity present, if any records exist.
    pub fn max_severity(&self) -> Option<Severity> {
        self.all_changes.iter().map(|r| r.severity()).max()
    }
}
