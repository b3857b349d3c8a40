//! Google Calendar integration.
//!
//! Schedules the plan review meeting. Access tokens come from the config or
//! environment, or from an OAuth token file that is refreshed through the
//! token endpoint when it carries a refresh token.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{expand_path, CalendarConfig, ExternalLinks};

/// Google Calendar API client bound to one calendar.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    /// OAuth access token
    access_token: String,
    /// Calendar ID (`primary` or an address)
    calendar_id: String,
    /// API base URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// A created event.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedEvent {
    /// Event ID
    pub id: String,
    /// Link to the event in the Calendar UI
    #[serde(rename = "htmlLink")]
    pub html_link: String,
}

/// The review meeting to schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// IANA time zone the start and end are expressed in
    pub time_zone: String,
    pub attendees: Vec<String>,
}

/// Result type for Calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;

/// Error types for Calendar operations.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google Calendar API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Google Calendar access token is missing or expired")]
    Unauthorized,

    #[error("Calendar not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid OAuth file {path}: {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Token refresh failed: {0}")]
    Refresh(String),
}

/// Today's date in an IANA time zone such as `Europe/Berlin`.
///
/// Unknown zones fall back to the local clock.
pub fn today_in(time_zone: &str, now: DateTime<Utc>) -> NaiveDate {
    match time_zone.parse::<chrono_tz::Tz>() {
        Ok(tz) => now.with_timezone(&tz).date_naive(),
        Err(_) => {
            tracing::warn!(time_zone, "Unknown time zone; using the local date");
            now.with_timezone(&chrono::Local).date_naive()
        }
    }
}

/// Compute the review start: `offset_days` after `today` at `hour:00`.
///
/// Hours past 23 are clamped to 23.
pub fn review_start(today: NaiveDate, offset_days: u32, hour: u32) -> NaiveDateTime {
    let date = today.checked_add_days(Days::new(u64::from(offset_days))).unwrap_or(today);
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

impl ReviewEvent {
    /// Build the review meeting for a feature.
    pub fn for_feature(
        title: &str,
        links: &ExternalLinks,
        config: &CalendarConfig,
        today: NaiveDate,
    ) -> Self {
        let start = review_start(today, config.review_offset_days, config.review_hour);
        let end = start + chrono::Duration::minutes(i64::from(config.duration_minutes.max(1)));

        let mut description = format!("Review of the development plan for \"{}\".\n", title);
        if !links.is_empty() {
            description.push('\n');
            for (kind, url) in links.iter() {
                description.push_str(&format!("{}: {}\n", kind.label(), url));
            }
        }

        Self {
            summary: format!("Review: {}", title),
            description,
            start,
            end,
            time_zone: config.time_zone.clone(),
            attendees: config.attendees.clone(),
        }
    }

    /// Request body for `events.insert`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "summary": self.summary,
            "description": self.description,
            "start": {
                "dateTime": self.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": self.time_zone
            },
            "end": {
                "dateTime": self.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": self.time_zone
            }
        });

        if !self.attendees.is_empty() {
            let attendees: Vec<serde_json::Value> =
                self.attendees.iter().map(|email| serde_json::json!({ "email": email })).collect();
            body["attendees"] = serde_json::json!(attendees);
        }

        body
    }
}

impl CalendarClient {
    /// Create a new Calendar client.
    pub fn new(access_token: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            calendar_id: calendar_id.into(),
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from configuration, resolving (and refreshing) the access token.
    ///
    /// Returns `Ok(None)` when no token source is configured.
    pub async fn from_config(config: &CalendarConfig) -> CalendarResult<Option<Self>> {
        let http = reqwest::Client::new();
        let Some(token) = resolve_access_token(config, &http).await? else {
            return Ok(None);
        };

        let mut client = Self::new(token, &config.calendar_id).with_base_url(&config.base_url);
        client.client = http;
        Ok(Some(client))
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Parse error response from the Calendar API.
    async fn parse_error(&self, response: reqwest::Response) -> CalendarError {
        let status = response.status().as_u16();

        match status {
            401 => CalendarError::Unauthorized,
            404 => CalendarError::NotFound(self.calendar_id.clone()),
            _ => {
                let message = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or_else(|| format!("HTTP {}", status));
                CalendarError::Api { status, message }
            }
        }
    }

    /// Insert an event into the calendar.
    pub async fn insert_event(&self, event: &ReviewEvent) -> CalendarResult<CreatedEvent> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        );

        let mut request = self.client.post(&url).bearer_auth(&self.access_token).json(&event.to_json());
        if !event.attendees.is_empty() {
            request = request.query(&[("sendUpdates", "all")]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let created: CreatedEvent = response.json().await?;
        tracing::info!(event = %created.id, start = %event.start, "Scheduled review meeting");
        Ok(created)
    }
}

/// OAuth token file, in the layout Google's client libraries write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    /// Access token
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// RFC 3339 expiry of the access token
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// Whether the access token is present and not known to be expired.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_none() {
            return false;
        }
        match self.expiry.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(expiry)) => expiry > now + chrono::Duration::seconds(60),
            _ => false,
        }
    }
}

/// Installed-app or web client credentials file.
#[derive(Debug, Clone, Deserialize)]
struct CredentialsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CalendarResult<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| CalendarError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content)
        .map_err(|source| CalendarError::InvalidFile { path: path.to_path_buf(), source })
}

/// Resolve the access token for the configured calendar.
///
/// A configured access token wins. Otherwise the token file is read; when it
/// has expired (or carries no expiry) and a refresh token plus client
/// credentials are available, it is refreshed and written back.
pub async fn resolve_access_token(
    config: &CalendarConfig,
    http: &reqwest::Client,
) -> CalendarResult<Option<String>> {
    if let Some(token) = config.access_token.as_ref().filter(|t| !t.is_empty()) {
        return Ok(Some(token.clone()));
    }

    let Some(token_path) = config.token_path.as_deref().map(expand_path) else {
        return Ok(None);
    };
    if !token_path.exists() {
        tracing::warn!(path = %token_path.display(), "Calendar token file not found");
        return Ok(None);
    }

    let mut stored: StoredToken = read_json(&token_path)?;
    if stored.is_fresh(Utc::now()) {
        return Ok(stored.token);
    }

    let Some(refresh_token) = stored.refresh_token.clone() else {
        return Ok(stored.token);
    };

    let secrets = match (&stored.client_id, &stored.client_secret) {
        (Some(id), Some(secret)) => {
            Some(ClientSecrets { client_id: id.clone(), client_secret: secret.clone() })
        }
        _ => match config.credentials_path.as_deref().map(expand_path) {
            Some(path) if path.exists() => Some(read_json::<CredentialsFile>(&path)?.installed),
            _ => None,
        },
    };
    let Some(secrets) = secrets else {
        tracing::debug!("No client credentials for token refresh, using stored token");
        return Ok(stored.token);
    };

    let refreshed = refresh(http, &config.token_url, &secrets, &refresh_token).await?;
    stored.token = Some(refreshed.access_token.clone());
    stored.expiry = refreshed
        .expires_in
        .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339());

    match serde_json::to_string_pretty(&stored) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&token_path, json) {
                tracing::warn!(error = %e, "Could not save refreshed calendar token");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not serialize refreshed calendar token"),
    }

    Ok(Some(refreshed.access_token))
}

async fn refresh(
    http: &reqwest::Client,
    token_url: &str,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> CalendarResult<RefreshResponse> {
    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let detail = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(CalendarError::Refresh(detail));
    }

    tracing::info!("Refreshed Google Calendar access token");
    Ok(response.json().await?)
}
