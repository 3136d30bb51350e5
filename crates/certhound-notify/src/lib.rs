use anyhow::bail;
use async_trait::async_trait;
use certhound_config::constants;
use certhound_config::NotifyConfig;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    fn marker(self) -> &'static str {
        match self {
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

/// Best-effort outbound status messages. Delivery failures are logged
/// and swallowed; they never affect orchestration control flow.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, message: &str, severity: Severity);
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    host: String,
    token: String,
    sender_id: String,
    room_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    wxcode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wxqun: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(constants::NOTIFY_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            host: config.webhook_host.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            sender_id: config.sender_id.clone(),
            room_id: config.room_id.clone(),
        })
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            text,
            wxcode: &self.sender_id,
            wxqun: self.room_id.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/api/send_wx/{}", self.host, self.token))
            .json(&payload)
            .send()
            .await?;

        let body: WebhookResponse = response.json().await?;
        if body.code != 200 || body.message != "ok" {
            bail!("webhook refused the message: {}", body.message);
        }
        Ok(())
    }
}

fn stamp(message: &str, severity: Severity) -> String {
    format!(
        "⏰ {}\n{} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        severity.marker(),
        message
    )
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn notify(&self, message: &str, severity: Severity) {
        if let Err(e) = self.send(&stamp(message, severity)).await {
            warn!("notification delivery failed: {e:#}");
        }
    }
}

/// Fallback when no webhook is configured: notifications degrade to log
/// lines at the matching level.
pub struct LogNotifier;

#[async_trait]
impl Notify for LogNotifier {
    async fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success => info!("notification: {message}"),
            Severity::Warning => warn!("notification: {message}"),
            Severity::Error => error!("notification: {message}"),
        }
    }
}
