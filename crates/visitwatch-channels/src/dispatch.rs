//! Gateway dispatch — fans a rendered report out to every enabled channel.

use async_trait::async_trait;

use visitwatch_core::config::WatchConfig;
use visitwatch_core::error::Result;
use visitwatch_core::settings::UserRecord;

use crate::email::EmailNotifier;
use crate::pushover::PushoverNotifier;
use crate::render::Report;

/// Whether the report is an immediate alert or a flushed daily digest.
/// Digests only go to digest-capable channels (email).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Immediate,
    Digest,
}

/// One delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this channel may carry accumulated digests.
    fn digest_capable(&self) -> bool {
        false
    }

    async fn send(&self, user: &UserRecord, report: &Report) -> Result<()>;
}

/// Result of one channel's delivery attempt.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: std::result::Result<(), String>,
}

/// Per-channel outcomes for one dispatch. Zero attempted channels (user
/// fully disabled, or nothing configured) counts as success.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub attempted: Vec<ChannelOutcome>,
}

impl DispatchOutcome {
    pub fn all_ok(&self) -> bool {
        self.attempted.iter().all(|o| o.result.is_ok())
    }

    pub fn failed_channels(&self) -> Vec<&str> {
        self.attempted
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.channel.as_str())
            .collect()
    }
}

/// The notification gateway: the set of configured channels.
pub struct Gateway {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Gateway {
    /// Gateway over an explicit channel set (tests use this with mocks).
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build the channel set from app config. Unconfigured transports are
    /// simply absent — a user toggle cannot enable a channel that has no
    /// transport behind it.
    pub fn from_config(config: &WatchConfig) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if config.smtp.is_configured() {
            notifiers.push(Box::new(EmailNotifier::new(config.smtp.clone())));
        } else {
            tracing::info!("SMTP not configured, email channel unavailable");
        }
        if config.pushover.is_configured() {
            notifiers.push(Box::new(PushoverNotifier::new(
                config.pushover.app_token.clone(),
            )));
        } else {
            tracing::info!("Pushover not configured, push channel unavailable");
        }
        Self { notifiers }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Send a report through every channel the user has enabled.
    ///
    /// A failing channel is recorded and the rest still run. A user with
    /// the master switch off gets an empty, successful outcome — routing
    /// and accumulation happen upstream regardless of this switch.
    pub async fn dispatch(
        &self,
        user: &UserRecord,
        report: &Report,
        kind: DispatchKind,
    ) -> DispatchOutcome {
        let settings = &user.notification_settings;
        let mut outcome = DispatchOutcome::default();

        if !settings.enabled {
            tracing::debug!("Notifications disabled for {}, skipping dispatch", user.user_id);
            return outcome;
        }

        for notifier in &self.notifiers {
            let enabled = match notifier.name() {
                "email" => settings.email.enabled,
                "pushover" => settings.pushover.enabled,
                _ => true,
            };
            if !enabled {
                continue;
            }
            if kind == DispatchKind::Digest && !notifier.digest_capable() {
                continue;
            }

            let result = notifier.send(user, report).await;
            match &result {
                Ok(()) => {
                    tracing::info!("✅ {} delivered to {}", notifier.name(), user.user_id);
                }
                Err(e) => {
                    tracing::warn!("⚠️ {} failed for {}: {e}", notifier.name(), user.user_id);
                }
            }
            outcome.attempted.push(ChannelOutcome {
                channel: notifier.name().to_string(),
                result: result.map_err(|e| e.to_string()),
            });
        }

        outcome
    }
}
