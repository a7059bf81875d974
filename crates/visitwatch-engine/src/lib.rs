//! # VisitWatch Engine
//!
//! The detection-and-dispatch core: diffs successive snapshots of a user's
//! scheduled visits, suppresses false removals for completed jobs, routes
//! changes to immediate delivery or a daily digest, and flushes due digests
//! on a periodic tick.
//!
//! ## Architecture
//! ```text
//! capture cycle (external scraper)
//!   └── rotate_snapshot → detect_changes ──▶ ChangeSet
//!                                              │
//!                              route_change_set┤
//!                        immediate ◀───────────┴──────────▶ daily
//!                            │                                │
//!                     Gateway dispatch                DigestAccumulator
//!                     (email + pushover)              (durable queue file)
//!                                                             │
//! tick loop (tokio interval) ── run_digest_tick ──▶ due? → flush → Gateway
//! ```
//!
//! Invariants this crate owns:
//! - no duplicate or lost changes: a ChangeSet is dispatched or queued
//!   exactly once, and a queue is cleared only after confirmed dispatch
//! - completed jobs never produce "removed" alerts
//! - at most one digest per delivery window per user

pub mod detector;
pub mod digest;
pub mod engine;
pub mod router;
pub mod scheduler;

pub use detector::{DetectorOptions, detect, normalize_job_id};
pub use digest::{DigestAccumulator, merge_change_sets};
pub use engine::{DispatchedNotification, RouteOutcome, WatchEngine};
pub use router::{RouteDecision, route};
pub use scheduler::{TickOutcome, TickStatus, is_within_window, spawn_digest_loop};
