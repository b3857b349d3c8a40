//! Status messages posted to the team channel.
//!
//! A [`NotificationMessage`] is built from run state and rendered into a Slack
//! `chat.postMessage` payload by [`NotificationMessage::to_slack_payload`].

use serde::{Deserialize, Serialize};

use crate::core::{ArtifactKind, ExternalLinks};
use crate::feedback::Feature;

/// Notification message to send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Message title, rendered as a header block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Message text content (mrkdwn).
    pub text: String,

    /// Additional fields (key-value pairs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<MessageField>,
}

/// A field in a notification message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
}

impl NotificationMessage {
    /// Create a simple text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self { title: None, text: text.into(), fields: Vec::new() }
    }

    /// Create a message with a title.
    pub fn with_title(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::text(text) }
    }

    /// Add a field to the message.
    pub fn add_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(MessageField { name: name.into(), value: value.into() });
        self
    }

    /// Announce that development of a feature has been kicked off.
    pub fn feature_started(feature: &Feature, step_count: usize, links: &ExternalLinks) -> Self {
        let text = format!(
            ":rocket: Development plan approved for *{}* ({} steps).\n>{}",
            feature.title,
            step_count,
            first_line(&feature.description)
        );

        let mut msg = Self::with_title(format!("Feature kicked off: {}", feature.title), text)
            .add_field("Priority", feature.priority.title())
            .add_field("Impact", format!("{:.2}", feature.impact_score));

        for (kind, url) in links.iter() {
            if kind == ArtifactKind::Notification {
                continue;
            }
            msg = msg.add_field(kind.label(), format!("<{}|Open>", url));
        }

        msg
    }

    /// Plain-text rendering, used as the notification fallback text.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(ref title) = self.title {
            out.push_str(title);
            out.push('\n');
        }
        out.push_str(&self.text);
        for field in &self.fields {
            out.push_str(&format!("\n{}: {}", field.name, field.value));
        }
        out
    }

    /// Build the `chat.postMessage` payload for a channel.
    pub fn to_slack_payload(&self, channel: &str) -> serde_json::Value {
        if self.fields.is_empty() && self.title.is_none() {
            return serde_json::json!({
                "channel": channel,
                "text": self.text
            });
        }

        let mut blocks = Vec::new();

        if let Some(ref title) = self.title {
            blocks.push(serde_json::json!({
                "type": "header",
                "text": { "type": "plain_text", "text": truncate(title, 150) }
            }));
        }

        blocks.push(serde_json::json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": truncate(&self.text, 3000) }
        }));

        // Slack allows at most 10 fields per section
        for chunk in self.fields.chunks(10) {
            let fields: Vec<serde_json::Value> = chunk
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "type": "mrkdwn",
                        "text": format!("*{}*\n{}", f.name, f.value)
                    })
                })
                .collect();
            blocks.push(serde_json::json!({ "type": "section", "fields": fields }));
        }

        serde_json::json!({
            "channel": channel,
            "text": self.plain_text(),
            "blocks": blocks
        })
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max - 3).collect();
        format!("{cut}...")
    }
}
