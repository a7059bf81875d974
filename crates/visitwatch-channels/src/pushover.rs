//! Pushover channel — HTTP POST to the Pushover messages API.

use async_trait::async_trait;

use visitwatch_core::error::{Result, WatchError};
use visitwatch_core::settings::UserRecord;

use crate::dispatch::Notifier;
use crate::render::Report;

const PUSHOVER_API: &str = "https://api.pushover.net/1/messages.json";

/// Sends rendered reports to the user's devices via Pushover. Immediate
/// alerts only — digests are email territory.
pub struct PushoverNotifier {
    app_token: String,
    client: reqwest::Client,
}

impl PushoverNotifier {
    pub fn new(app_token: String) -> Self {
        Self {
            app_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn name(&self) -> &'static str {
        "pushover"
    }

    async fn send(&self, user: &UserRecord, report: &Report) -> Result<()> {
        if user.pushover_user_key.is_empty() {
            return Err(WatchError::Dispatch(format!(
                "user {} has no pushover key",
                user.user_id
            )));
        }

        let priority = user.notification_settings.pushover.priority().api_value();
        let resp = self
            .client
            .post(PUSHOVER_API)
            .json(&serde_json::json!({
                "token": self.app_token,
                "user": user.pushover_user_key,
                "title": report.subject,
                "message": report.body,
                "priority": priority,
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| WatchError::Dispatch(format!("Pushover send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("📲 Pushover notification sent to {}", user.user_id);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(WatchError::Dispatch(format!(
                "Pushover API error {status}: {body}"
            )))
        }
    }
}
