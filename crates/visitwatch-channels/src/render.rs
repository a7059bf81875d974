//! Plain-text rendering of change sets for delivery.

use visitwatch_core::types::{ChangeRecord, ChangeSet};

/// A rendered notification: subject line plus plain-text body.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub subject: String,
    pub body: String,
}

/// Render a single detection cycle's changes for immediate delivery.
pub fn render_change_set(set: &ChangeSet) -> Report {
    let subject = format!(
        "⚠️ Schedule alert: {} change(s) to your visits",
        set.summary.total()
    );
    let mut body = format!(
        "Schedule changes detected at {}\n",
        set.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    body.push_str(&render_records(&set.all_changes));
    body.push_str(&format!("\nSummary: {}\n", set.summary));
    Report { subject, body }
}

/// Render a merged digest covering every accumulation since the last flush.
pub fn render_digest(set: &ChangeSet) -> Report {
    let subject = format!(
        "📋 Daily schedule digest: {} change(s)",
        set.summary.total()
    );
    let mut body = String::from("Your daily summary of schedule changes.\n");
    body.push_str(&render_records(&set.all_changes));
    body.push_str(&format!("\nSummary: {}\n", set.summary));
    Report { subject, body }
}

fn render_records(records: &[ChangeRecord]) -> String {
    let mut out = String::new();

    let removed: Vec<_> = records
        .iter()
        .filter(|r| matches!(r, ChangeRecord::Removed { .. }))
        .collect();
    let added: Vec<_> = records
        .iter()
        .filter(|r| matches!(r, ChangeRecord::Added { .. }))
        .collect();
    let moved: Vec<_> = records
        .iter()
        .filter(|r| matches!(r, ChangeRecord::DateChanged { .. }))
        .collect();
    let swapped: Vec<_> = records
        .iter()
        .filter(|r| matches!(r, ChangeRecord::Swapped { .. }))
        .collect();

    if !removed.is_empty() {
        out.push_str("\n🚨 Removed from schedule:\n");
        for r in removed {
            out.push_str(&record_line(r));
        }
    }
    if !added.is_empty() {
        out.push_str("\n➕ Added to schedule:\n");
        for r in added {
            out.push_str(&record_line(r));
        }
    }
    if !moved.is_empty() {
        out.push_str("\n📅 Date changed:\n");
        for r in moved {
            out.push_str(&record_line(r));
        }
    }
    if !swapped.is_empty() {
        out.push_str("\n🔁 Rebooked under a new job:\n");
        for r in swapped {
            out.push_str(&record_line(r));
        }
    }
    out
}

fn record_line(record: &ChangeRecord) -> String {
    match record {
        ChangeRecord::Added {
            job_id,
            store_number,
            store_name,
            location,
            scheduled_date,
            dispenser_count,
        }
        | ChangeRecord::Removed {
            job_id,
            store_number,
            store_name,
            location,
            scheduled_date,
            dispenser_count,
        } => format!(
            "  • {store_name} (#{store_number}) — {location} — {scheduled_date}, {dispenser_count} dispenser(s) [{job_id}]\n"
        ),
        ChangeRecord::DateChanged {
            job_id,
            store_number,
            store_name,
            location,
            old_date,
            new_date,
        } => format!(
            "  • {store_name} (#{store_number}) — {location} — {old_date} → {new_date} [{job_id}]\n"
        ),
        ChangeRecord::Swapped {
            store_number,
            store_name,
            location,
            removed_job_id,
            added_job_id,
            old_date,
            new_date,
        } => format!(
            "  • {store_name} (#{store_number}) — {location} — {old_date} → {new_date} [{removed_job_id} → {added_job_id}]\n"
        ),
    }
}
