//! The engine facade — entry points consumed by the capture cycle, the
//! scheduler driver, and administrative tooling.
//!
//! Every operation takes an explicit user id; per-user state is serialized
//! behind a per-user async lock so snapshot rotation and digest
//! accumulate/flush never interleave for one user, while different users
//! proceed in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Mutex;

use visitwatch_channels::dispatch::{DispatchKind, DispatchOutcome, Gateway};
use visitwatch_channels::render::{Report, render_change_set, render_digest};
use visitwatch_core::config::WatchConfig;
use visitwatch_core::error::{Result, WatchError};
use visitwatch_core::settings::{Frequency, UserRecord};
use visitwatch_core::store::{SnapshotSlot, UserStore};
use visitwatch_core::types::{ChangeSet, Severity, Snapshot};

use crate::detector::{DetectorOptions, detect, normalize_job_id};
use crate::digest::DigestAccumulator;
use crate::router::{RouteDecision, route};
use crate::scheduler::{FireGuard, TickOutcome, TickStatus, is_within_window};

const HISTORY_CAP: usize = 100;

/// What happened to a routed change set.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Dispatched immediately; per-channel outcomes attached.
    Dispatched(DispatchOutcome),
    /// Appended to the user's digest queue for the next delivery window.
    Accumulated,
    /// The change set was empty — nothing to route.
    Empty,
}

/// One dispatched notification, kept in the diagnostic history ring.
#[derive(Debug, Clone)]
pub struct DispatchedNotification {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub severity: Option<Severity>,
    /// "immediate" or "digest".
    pub source: &'static str,
    pub channels: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The detection-and-dispatch engine.
pub struct WatchEngine {
    store: Arc<UserStore>,
    gateway: Gateway,
    digest: DigestAccumulator,
    detector_options: DetectorOptions,
    tolerance_mins: i64,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    fire_guard: Mutex<FireGuard>,
    history: std::sync::Mutex<Vec<DispatchedNotification>>,
}

impl WatchEngine {
    pub fn new(config: &WatchConfig, gateway: Gateway) -> Self {
        let store = Arc::new(UserStore::new(&config.data_root));
        Self {
            digest: DigestAccumulator::new(store.clone()),
            detector_options: DetectorOptions::from(&config.detector),
            tolerance_mins: config.window_tolerance_mins,
            locks: Mutex::new(HashMap::new()),
            fire_guard: Mutex::new(FireGuard::new(config.window_tolerance_mins)),
            history: std::sync::Mutex::new(Vec::new()),
            store,
            gateway,
        }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn digest(&self) -> &DigestAccumulator {
        &self.digest
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Rotate snapshots for a fresh capture: current → previous, `new` →
    /// current. Called by the capture cycle before [`Self::detect_changes`].
    pub async fn rotate_snapshot(&self, user_id: &str, new: Snapshot) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let _held = lock.lock().await;
        self.store.rotate_snapshot(user_id, &new)
    }

    /// Diff the stored previous/current snapshots, consulting the
    /// completed-job registry. An incomplete snapshot pair (first capture,
    /// or a corrupt file) yields an empty set, never an error.
    pub async fn detect_changes(&self, user_id: &str) -> Result<ChangeSet> {
        let lock = self.user_lock(user_id).await;
        let _held = lock.lock().await;

        let previous = self.store.load_snapshot(user_id, SnapshotSlot::Previous);
        let current = self.store.load_snapshot(user_id, SnapshotSlot::Current);
        let (Some(previous), Some(current)) = (previous, current) else {
            tracing::debug!("Snapshot pair incomplete for {user_id}, nothing to compare");
            return Ok(ChangeSet::empty());
        };

        let completed: HashSet<String> = self
            .store
            .completed_jobs(user_id)
            .iter()
            .filter_map(|id| normalize_job_id(id))
            .collect();

        let set = detect(
            &previous,
            &current,
            |id| completed.contains(id),
            &self.detector_options,
        );
        if !set.is_empty() {
            tracing::info!(
                "🔍 {} change(s) detected for {user_id}: {}",
                set.summary.total(),
                set.summary
            );
        }
        Ok(set)
    }

    /// Route a detected change set: dispatch now, or accumulate for the
    /// daily digest. A dispatch failure is returned to the caller — the
    /// change is not requeued here (the next capture cycle re-derives the
    /// same delta while the snapshots stand).
    pub async fn route_change_set(
        &self,
        user_id: &str,
        change_set: ChangeSet,
    ) -> Result<RouteOutcome> {
        if change_set.is_empty() {
            tracing::debug!("Empty change set for {user_id}, nothing to route");
            return Ok(RouteOutcome::Empty);
        }

        let user = self.store.load_user(user_id)?;
        match route(&change_set, &user.notification_settings) {
            RouteDecision::Accumulate => {
                let lock = self.user_lock(user_id).await;
                let _held = lock.lock().await;
                self.digest.accumulate(user_id, change_set)?;
                Ok(RouteOutcome::Accumulated)
            }
            RouteDecision::Dispatch => {
                let report = render_change_set(&change_set);
                let outcome = self
                    .gateway
                    .dispatch(&user, &report, DispatchKind::Immediate)
                    .await;
                if outcome.all_ok() {
                    self.record_dispatch(&user, &report, &change_set, "immediate", &outcome);
                    Ok(RouteOutcome::Dispatched(outcome))
                } else {
                    Err(WatchError::Dispatch(format!(
                        "immediate dispatch for {user_id} failed on: {}",
                        outcome.failed_channels().join(", ")
                    )))
                }
            }
        }
    }

    /// One scheduler pass over every known user. Failures are isolated per
    /// user; the returned outcomes cover each daily-digest user considered.
    pub async fn run_digest_tick(&self, now: DateTime<Local>) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for user_id in self.store.list_users() {
            if let Some(status) = self.tick_user(&user_id, now).await {
                outcomes.push(TickOutcome { user_id, status });
            }
        }
        outcomes
    }

    /// Consider one user for this tick. `None` means the user is not a
    /// daily-digest user and was not considered.
    async fn tick_user(&self, user_id: &str, now: DateTime<Local>) -> Option<TickStatus> {
        let user = match self.store.load_user(user_id) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("⚠️ Skipping {user_id} this tick: {e}");
                return Some(TickStatus::Failed(e.to_string()));
            }
        };

        // A master-disabled user keeps accumulating: flushing here would
        // clear the queue into zero channels and lose the backlog.
        if !user.notification_settings.enabled {
            return None;
        }
        let email = &user.notification_settings.email;
        if email.frequency() != Frequency::Daily || !email.enabled {
            return None;
        }
        if !is_within_window(now.time(), email.delivery_time(), self.tolerance_mins) {
            return Some(TickStatus::NotDue);
        }
        if !self.fire_guard.lock().await.should_fire(user_id, now) {
            return Some(TickStatus::AlreadyFired);
        }

        let lock = self.user_lock(user_id).await;
        let _held = lock.lock().await;

        let combined = match self.digest.pending(user_id) {
            Ok(Some(combined)) => combined,
            Ok(None) => return Some(TickStatus::NothingQueued),
            Err(e) => return Some(TickStatus::Failed(e.to_string())),
        };

        let report = render_digest(&combined);
        let outcome = self
            .gateway
            .dispatch(&user, &report, DispatchKind::Digest)
            .await;
        if !outcome.all_ok() {
            // Queue stays intact; the next tick in this window retries.
            return Some(TickStatus::Failed(format!(
                "digest dispatch failed on: {}",
                outcome.failed_channels().join(", ")
            )));
        }

        self.fire_guard.lock().await.mark_fired(user_id, now);
        if let Err(e) = self.digest.confirm_flushed(user_id) {
            // Dispatch went out but the queue survived; the next window may
            // deliver a duplicate, which at-least-once allows.
            tracing::warn!("⚠️ Digest for {user_id} sent but queue not cleared: {e}");
            return Some(TickStatus::Failed(e.to_string()));
        }

        self.record_dispatch(&user, &report, &combined, "digest", &outcome);
        Some(TickStatus::Sent {
            changes: combined.summary.total(),
        })
    }

    /// Administrative flush, bypassing the delivery window (and the fire
    /// guard — a manual flush must not eat the scheduled one). Returns the
    /// combined set that was dispatched, or `None` if nothing was queued.
    pub async fn force_flush(&self, user_id: &str) -> Result<Option<ChangeSet>> {
        let lock = self.user_lock(user_id).await;
        let _held = lock.lock().await;

        let Some(combined) = self.digest.pending(user_id)? else {
            return Ok(None);
        };
        let user = self.store.load_user(user_id)?;
        let report = render_digest(&combined);
        let outcome = self
            .gateway
            .dispatch(&user, &report, DispatchKind::Digest)
            .await;
        if !outcome.all_ok() {
            return Err(WatchError::Dispatch(format!(
                "digest dispatch for {user_id} failed on: {}",
                outcome.failed_channels().join(", ")
            )));
        }
        self.digest.confirm_flushed(user_id)?;
        self.record_dispatch(&user, &report, &combined, "digest", &outcome);
        Ok(Some(combined))
    }

    /// Recent dispatched notifications, newest last. Diagnostic only.
    pub fn history(&self) -> Vec<DispatchedNotification> {
        self.history.lock().expect("history lock").clone()
    }

    fn record_dispatch(
        &self,
        user: &UserRecord,
        report: &Report,
        change_set: &ChangeSet,
        source: &'static str,
        outcome: &DispatchOutcome,
    ) {
        if outcome.attempted.is_empty() {
            return;
        }
        let mut history = self.history.lock().expect("history lock");
        history.push(DispatchedNotification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.user_id.clone(),
            subject: report.subject.clone(),
            severity: change_set.max_severity(),
            source,
            channels: outcome
                .attempted
                .iter()
                .map(|o| o.channel.clone())
                .collect(),
            timestamp: Utc::now(),
        });
        if history.len() > HISTORY_CAP {
            let excess = history.len() - HISTORY_CAP;
            history.drain(..excess);
        }
    }
}
