//! Slack Web API integration.
//!
//! Uses a bot token to read channel history for feedback analysis and to post
//! status messages. Every Web API method answers HTTP 200 with an `ok` flag,
//! so errors are decoded from the body rather than the status code.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::notifications::NotificationMessage;
use crate::core::SlackConfig;

/// Slack Web API client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    /// Bot token (xoxb-...)
    token: String,
    /// Web API base URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// A message from `conversations.history`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    /// Author user ID (absent for some bot and system messages)
    #[serde(default)]
    pub user: Option<String>,
    /// Message text
    #[serde(default)]
    pub text: Option<String>,
    /// Message timestamp
    #[serde(default)]
    pub ts: Option<String>,
    /// Subtype such as `channel_join`
    #[serde(default)]
    pub subtype: Option<String>,
}

/// A posted message, as returned by `chat.postMessage`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostedMessage {
    /// Channel ID the message landed in
    pub channel: String,
    /// Message timestamp
    pub ts: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct Permalink {
    permalink: String,
}

/// Result type for Slack operations.
pub type SlackResult<T> = Result<T, SlackError>;

/// Error types for Slack operations.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack API error in {method}: {error}")]
    Api { method: String, error: String },

    #[error("Unexpected Slack response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("The bot is not a member of channel {0}; invite it with /invite and retry")]
    NotInChannel(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Slack token is missing or invalid")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },
}

impl SlackClient {
    /// Create a new Slack client.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: "https://slack.com/api".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from configuration. Returns `None` without a bot token.
    pub fn from_config(config: &SlackConfig) -> Option<Self> {
        let token = config.bot_token.as_ref()?;
        Some(Self::new(token.clone()).with_base_url(&config.base_url))
    }

    /// Use a different Web API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Call a read method with query parameters.
    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> SlackResult<T> {
        let response = self
            .client
            .get(self.method_url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        self.decode(method, response).await
    }

    /// Call a write method with a JSON body.
    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> SlackResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(body)
            .send()
            .await?;
        self.decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> SlackResult<T> {
        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(SlackError::RateLimited { retry_after });
        }
        if status == 401 {
            return Err(SlackError::Unauthorized);
        }

        let body: serde_json::Value = response.json().await?;
        if body.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown_error")
                .to_string();
            return Err(map_api_error(method, error));
        }

        Ok(serde_json::from_value(body)?)
    }

    /// Resolve a channel name (with or without `#`) to its ID.
    ///
    /// Values that already look like channel IDs are returned unchanged.
    pub async fn resolve_channel(&self, channel: &str) -> SlackResult<String> {
        let name = channel.trim().trim_start_matches('#');
        if looks_like_channel_id(name) {
            return Ok(name.to_string());
        }

        let mut cursor = String::new();
        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel"),
                ("exclude_archived", "true"),
                ("limit", "200"),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: ChannelList = self.get("conversations.list", &query).await?;
            if let Some(found) = page.channels.into_iter().find(|c| c.name == name) {
                tracing::debug!(name, id = %found.id, "Resolved Slack channel");
                return Ok(found.id);
            }

            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => break,
            }
        }

        Err(SlackError::ChannelNotFound(name.to_string()))
    }

    /// Fetch the most recent messages of a channel.
    pub async fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> SlackResult<Vec<SlackMessage>> {
        let limit = limit.to_string();
        let history: History = self
            .get("conversations.history", &[("channel", channel_id), ("limit", limit.as_str())])
            .await
            .map_err(|e| e.for_channel(channel_id))?;
        Ok(history.messages)
    }

    /// Post a prepared `chat.postMessage` payload.
    pub async fn post_message(&self, payload: &serde_json::Value) -> SlackResult<PostedMessage> {
        self.post("chat.postMessage", payload).await
    }

    /// Get the permalink of a posted message.
    pub async fn permalink(&self, channel_id: &str, ts: &str) -> SlackResult<String> {
        let link: Permalink = self
            .get("chat.getPermalink", &[("channel", channel_id), ("message_ts", ts)])
            .await?;
        Ok(link.permalink)
    }

    /// Post a notification and return its permalink.
    pub async fn send_notification(
        &self,
        channel: &str,
        message: &NotificationMessage,
    ) -> SlackResult<String> {
        let channel_id = self.resolve_channel(channel).await?;
        let posted = self
            .post_message(&message.to_slack_payload(&channel_id))
            .await
            .map_err(|e| e.for_channel(channel))?;
        tracing::info!(channel = %posted.channel, ts = %posted.ts, "Posted Slack notification");
        self.permalink(&posted.channel, &posted.ts).await
    }
}

impl SlackError {
    /// Attach the channel a membership or lookup error refers to.
    fn for_channel(self, channel: &str) -> Self {
        match self {
            Self::NotInChannel(_) => Self::NotInChannel(channel.to_string()),
            Self::ChannelNotFound(_) => Self::ChannelNotFound(channel.to_string()),
            other => other,
        }
    }
}

fn map_api_error(method: &str, error: String) -> SlackError {
    match error.as_str() {
        "not_in_channel" => SlackError::NotInChannel(String::new()),
        "channel_not_found" => SlackError::ChannelNotFound(String::new()),
        "invalid_auth" | "not_authed" | "token_revoked" | "account_inactive" => {
            SlackError::Unauthorized
        }
        "ratelimited" => SlackError::RateLimited { retry_after: None },
        _ => SlackError::Api { method: method.to_string(), error },
    }
}

/// Whether a value looks like a Slack conversation ID (C…, G…, D…).
pub fn looks_like_channel_id(value: &str) -> bool {
    value.len() >= 9
        && matches!(value.chars().next(), Some('C' | 'G' | 'D'))
        && value.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
