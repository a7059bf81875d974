//! Digest scheduling — delivery-window matching and the tick loop.
//!
//! Ticks arrive on a fixed interval; the window match is deliberately
//! coarse (±tolerance minutes around the configured HH:MM) so tick jitter
//! cannot miss a delivery. Because interval and tolerance are independent
//! deployment parameters, a per-user last-fired guard stops the same window
//! from flushing twice.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveTime, Timelike};

use crate::engine::WatchEngine;

/// Whether `now` falls within ±`tolerance_mins` of `target`, at minute
/// resolution, wrapping correctly across midnight.
pub fn is_within_window(now: NaiveTime, target: NaiveTime, tolerance_mins: i64) -> bool {
    let now_mins = (now.hour() * 60 + now.minute()) as i64;
    let target_mins = (target.hour() * 60 + target.minute()) as i64;
    let diff = (now_mins - target_mins).abs();
    diff.min(1440 - diff) <= tolerance_mins
}

/// Per-user duplicate-fire guard: once a user's digest flushes, that user
/// is held back until the whole window (2 × tolerance) has passed.
pub struct FireGuard {
    tolerance_mins: i64,
    last_fired: HashMap<String, DateTime<Local>>,
}

impl FireGuard {
    pub fn new(tolerance_mins: i64) -> Self {
        Self {
            tolerance_mins,
            last_fired: HashMap::new(),
        }
    }

    /// Whether the user may fire at `now`.
    pub fn should_fire(&self, user_id: &str, now: DateTime<Local>) -> bool {
        match self.last_fired.get(user_id) {
            Some(last) => {
                now.signed_duration_since(*last) >= Duration::minutes(2 * self.tolerance_mins)
            }
            None => true,
        }
    }

    /// Record a successful fire.
    pub fn mark_fired(&mut self, user_id: &str, now: DateTime<Local>) {
        self.last_fired.insert(user_id.to_string(), now);
    }
}

/// Per-user result of one scheduler tick. Only daily-digest users appear.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub user_id: String,
    pub status: TickStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Digest flushed and dispatched; queue cleared.
    Sent { changes: usize },
    /// Window hit but nothing was queued — not an error.
    NothingQueued,
    /// Outside the user's delivery window.
    NotDue,
    /// Already flushed for this window.
    AlreadyFired,
    /// This user's cycle failed; other users are unaffected.
    Failed(String),
}

/// Run the digest scheduler as a long-lived loop. Ticks never overlap —
/// each `run_digest_tick` completes before the next interval fires.
pub async fn spawn_digest_loop(engine: Arc<WatchEngine>, check_interval_secs: u64) {
    tracing::info!("⏰ Digest scheduler started (check every {check_interval_secs}s)");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;
        let outcomes = engine.run_digest_tick(Local::now()).await;
        for outcome in &outcomes {
            match &outcome.status {
                TickStatus::Sent { changes } => {
                    tracing::info!("📣 Digest sent to {} ({changes} change(s))", outcome.user_id);
                }
                TickStatus::Failed(e) => {
                    tracing::warn!("⚠️ Digest tick failed for {}: {e}", outcome.user_id);
                }
                _ => {}
            }
        }
    }
}
