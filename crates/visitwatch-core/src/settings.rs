//! Per-user notification settings with one explicit default table.
//!
//! Frequency, priority, and delivery time travel as plain strings in the
//! user record so that an unrecognized value degrades to its documented
//! default instead of failing the whole record. The default table:
//!
//! | field                  | default     |
//! |------------------------|-------------|
//! | `enabled`              | `true`      |
//! | `email.enabled`        | `true`      |
//! | `email.frequency`      | `immediate` |
//! | `email.deliveryTime`   | `18:00`     |
//! | `pushover.enabled`     | `true`      |
//! | `pushover.priority`    | `normal`    |

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// How often the email channel delivers: right away, or once per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Immediate,
    Daily,
}

impl Frequency {
    /// Parse a stored frequency string. Anything unrecognized falls back to
    /// `Immediate` — a change must never be silently dropped because a
    /// settings record holds a value this version does not know.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Self::Daily,
            "immediate" => Self::Immediate,
            other => {
                tracing::warn!("Unknown frequency '{other}', falling back to immediate");
                Self::Immediate
            }
        }
    }
}

/// Pushover message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPriority {
    Lowest,
    Low,
    Normal,
    High,
    Emergency,
}

impl PushPriority {
    /// Parse a stored priority string; unknown values become `Normal`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lowest" => Self::Lowest,
            "low" => Self::Low,
            "normal" => Self::Normal,
            "high" => Self::High,
            "emergency" => Self::Emergency,
            other => {
                tracing::warn!("Unknown pushover priority '{other}', using normal");
                Self::Normal
            }
        }
    }

    /// Numeric value the Pushover API expects.
    pub fn api_value(&self) -> i8 {
        match self {
            Self::Lowest => -2,
            Self::Low => -1,
            Self::Normal => 0,
            Self::High => 1,
            Self::Emergency => 2,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_frequency() -> String {
    "immediate".into()
}
fn default_delivery_time() -> String {
    "18:00".into()
}
fn default_priority() -> String {
    "normal".into()
}

/// Email channel settings — the only digest-capable channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    /// Local wall-clock delivery time for daily digests, "HH:MM".
    #[serde(default = "default_delivery_time")]
    pub delivery_time: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: default_frequency(),
            delivery_time: default_delivery_time(),
        }
    }
}

impl EmailSettings {
    pub fn frequency(&self) -> Frequency {
        Frequency::parse(&self.frequency)
    }

    /// Parsed delivery time; a malformed value falls back to 18:00.
    pub fn delivery_time(&self) -> NaiveTime {
        match NaiveTime::parse_from_str(self.delivery_time.trim(), "%H:%M") {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(
                    "Unparseable deliveryTime '{}', using 18:00",
                    self.delivery_time
                );
                NaiveTime::from_hms_opt(18, 0, 0).expect("static time")
            }
        }
    }
}

/// Pushover channel settings. Pushover delivery is always immediate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushoverSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: String,
}

impl Default for PushoverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: default_priority(),
        }
    }
}

impl PushoverSettings {
    pub fn priority(&self) -> PushPriority {
        PushPriority::parse(&self.priority)
    }
}

/// A user's notification configuration. Missing fields take the defaults
/// in the module-level table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    /// Master switch. Routing decisions ignore this — only dispatch does —
    /// so a disabled user's daily digest keeps accumulating.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub pushover: PushoverSettings,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            email: EmailSettings::default(),
            pushover: PushoverSettings::default(),
        }
    }
}

/// The user record as persisted in `user.json`. Owned by the external user
/// management layer; read-only from this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub pushover_user_key: String,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}
