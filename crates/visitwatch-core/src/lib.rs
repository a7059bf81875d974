//! # VisitWatch Core
//!
//! Shared foundation for the VisitWatch engine: the snapshot/change data
//! model, per-user notification settings with explicit defaults, the app
//! config, and the file-backed state stores.
//!
//! ## Design Principles
//! - All persisted state is per-user JSON — human-readable, git-friendly
//! - Every write is temp-file + atomic rename; a reader never sees a torn file
//! - Missing external state degrades to a safe default, never to an abort
//! - No ambient "current user": every operation takes an explicit user id
//!
//! ## State layout
//! ```text
//! <data_root>/users/<user_id>/
//!   ├── user.json               user record + notificationSettings
//!   ├── snapshot-current.json   latest capture
//!   ├── snapshot-previous.json  prior capture (rotated wholesale)
//!   ├── completed-jobs.json     external registry (read-only here)
//!   └── digest-queue.json       accumulated change sets awaiting delivery
//! ```

pub mod config;
pub mod error;
pub mod settings;
pub mod store;
pub mod types;

pub use config::WatchConfig;
pub use error::{Result, WatchError};
pub use settings::{Frequency, NotificationSettings, PushPriority, UserRecord};
pub use store::{SnapshotSlot, UserStore};
pub use types::{ChangeKind, ChangeRecord, ChangeSet, ChangeSummary, Severity, Snapshot, Visit};
