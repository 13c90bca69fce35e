// # Discord Webhook Notifier
//
// This crate provides a Notifier that posts availability changes to a
// Discord-compatible webhook.
//
// ## Message Shape
//
// ```json
// {
//   "username": "OVH Availability",
//   "avatar_url": "https://...",
//   "content": "**20game01** datacenters have been updated",
//   "embeds": [{
//     "title": "20game01 (20game01)",
//     "description": "```json\n[ ...new datacenter list... ]\n```",
//     "color": 3066993,
//     "timestamp": "2024-01-01T00:00:00Z",
//     "fields": [{ "name": "Previously", "value": "rbx: unavailable", "inline": false }]
//   }]
// }
// ```
//
// ## Security
//
// The webhook URL embeds its own credential. It is never logged and the
// Debug implementation redacts it.

use async_trait::async_trait;
use dcwatch_core::config::{NotifierConfig, default_webhook_avatar_url, default_webhook_username};
use dcwatch_core::traits::Notifier;
use dcwatch_core::{AvailabilityChange, DatacenterStatus, Error, Result};
use serde::Serialize;
use std::time::Duration;

/// Default HTTP timeout for webhook delivery
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord embed description limit
const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Discord embed field value limit
const MAX_FIELD_CHARS: usize = 1024;

/// Discord limit on fields per embed
const MAX_FIELDS: usize = 25;

/// Embed colour when at least one datacenter has stock
const COLOR_AVAILABLE: u32 = 0x2E_CC_71;

/// Embed colour when nothing is available
const COLOR_UNAVAILABLE: u32 = 0xE7_4C_3C;

/// Availability label meaning "no stock"
const UNAVAILABLE: &str = "unavailable";

/// Webhook request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub avatar_url: String,
    pub content: String,
    pub embeds: Vec<Embed>,
}

/// Rich content block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// One name/value pair shown under an embed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Discord webhook notifier
pub struct DiscordWebhookNotifier {
    /// Webhook URL
    /// NEVER log this value
    webhook_url: String,

    /// Display name of the message author
    username: String,

    /// Avatar of the message author
    avatar_url: String,

    /// HTTP client for webhook delivery
    client: reqwest::Client,
}

// Custom Debug implementation that hides the webhook URL
impl std::fmt::Debug for DiscordWebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordWebhookNotifier")
            .field("webhook_url", &"<REDACTED>")
            .field("username", &self.username)
            .field("avatar_url", &self.avatar_url)
            .finish()
    }
}

impl DiscordWebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Parameters
    ///
    /// - `webhook_url`: full webhook URL, including its token
    /// - `username`: display name of the message author
    /// - `avatar_url`: avatar of the message author
    pub fn new(
        webhook_url: impl Into<String>,
        username: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.is_empty() {
            return Err(Error::config("Webhook URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            username: username.into(),
            avatar_url: avatar_url.into(),
            client,
        })
    }

    /// Create a notifier with the default display name and avatar
    pub fn with_defaults(webhook_url: impl Into<String>) -> Result<Self> {
        Self::new(
            webhook_url,
            default_webhook_username(),
            default_webhook_avatar_url(),
        )
    }

    /// Create a notifier from configuration
    ///
    /// Returns `Ok(None)` when notifications are disabled.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        config.validate()?;
        match config {
            NotifierConfig::Disabled => Ok(None),
            NotifierConfig::DiscordWebhook {
                url,
                username,
                avatar_url,
            } => Ok(Some(Self::new(
                url.clone(),
                username.clone(),
                avatar_url.clone(),
            )?)),
        }
    }

    /// Build the webhook body for a change
    pub fn build_payload(&self, change: &AvailabilityChange) -> WebhookPayload {
        let content = format!(
            "**{}** datacenters have been updated ({} change{})",
            change.plan_code,
            change.changes.len(),
            if change.changes.len() == 1 { "" } else { "s" }
        );

        // Whole new response, as pretty JSON
        let listing: Vec<serde_json::Value> = change
            .current
            .iter()
            .map(|entry| serde_json::json!({ "fqn": entry.fqn, "datacenters": entry.datacenters }))
            .collect();
        let pretty = serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "[]".to_string());

        let fence_overhead = "```json\n\n```".len();
        let description = format!(
            "```json\n{}\n```",
            truncate(&pretty, MAX_DESCRIPTION_CHARS - fence_overhead)
        );

        let fields = change
            .changes
            .iter()
            .take(MAX_FIELDS)
            .map(|c| EmbedField {
                name: format!("Previously: {}", c.fqn()),
                value: truncate(&summarize(c.previous()), MAX_FIELD_CHARS),
                inline: false,
            })
            .collect();

        let available = change
            .current_datacenters()
            .iter()
            .any(|dc| dc.availability != UNAVAILABLE);

        WebhookPayload {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            content,
            embeds: vec![Embed {
                title: format!("{} ({})", change.plan_code, change.server),
                description,
                color: if available {
                    COLOR_AVAILABLE
                } else {
                    COLOR_UNAVAILABLE
                },
                timestamp: change.detected_at.to_rfc3339(),
                fields,
            }],
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn notify(&self, change: &AvailabilityChange) -> Result<()> {
        let payload = self.build_payload(change);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            // reqwest errors carry the URL; keep it out of the message
            .map_err(|e| Error::http(format!("Webhook request failed: {}", e.without_url())))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Webhook accepted notification for {}", change.plan_code);
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let error_text = truncate(&error_text, 200);

        Err(match status.as_u16() {
            401 | 403 | 404 => Error::upstream(
                "discord",
                format!("Webhook rejected (invalid or deleted webhook). Status: {}", status),
            ),
            429 => Error::upstream(
                "discord",
                format!("Rate limit exceeded. Status: {}", status),
            ),
            _ => Error::upstream(
                "discord",
                format!("Webhook delivery failed: {} - {}", status, error_text),
            ),
        })
    }

    fn notifier_name(&self) -> &'static str {
        "discord"
    }
}

/// One-line listing such as `rbx: unavailable, gra: 1H-low`
fn summarize(datacenters: &[DatacenterStatus]) -> String {
    if datacenters.is_empty() {
        return "(none)".to_string();
    }
    datacenters
        .iter()
        .map(|dc| format!("{}: {}", dc.datacenter, dc.availability))
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
