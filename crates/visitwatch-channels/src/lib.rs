//! # VisitWatch Channels
//!
//! The notification gateway: renders a change set into a plain-text report
//! and fans it out to the channels a user has enabled.
//!
//! ```text
//! ChangeSet ──render──▶ Report ──Gateway──▶ EmailNotifier    (SMTP, digest-capable)
//!                                      └──▶ PushoverNotifier (HTTP, immediate only)
//! ```
//!
//! Channel failures are collected per channel, never short-circuited: one
//! dead transport must not mask a healthy one.

pub mod dispatch;
pub mod email;
pub mod pushover;
pub mod render;

pub use dispatch::{ChannelOutcome, DispatchKind, DispatchOutcome, Gateway, Notifier};
pub use email::EmailNotifier;
pub use pushover::PushoverNotifier;
pub use render::{Report, render_change_set, render_digest};
