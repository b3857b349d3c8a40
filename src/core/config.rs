//! Configuration management for pmflow.
//!
//! Handles loading configuration from TOML files and overlaying credentials
//! from the environment (including a `.env` file).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// AI planner settings
    pub ai: AiConfig,

    /// Slack settings
    pub slack: SlackConfig,

    /// Notion settings
    pub notion: NotionConfig,

    /// GitHub settings
    pub github: GitHubConfig,

    /// Google Calendar settings
    pub calendar: CalendarConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Feedback analysis file read by `run`
    pub feedback_file: PathBuf,

    /// Directory for run artifacts (approved plan, PRD, results)
    pub output_dir: PathBuf,

    /// Skip the confirmation prompt before each publish step
    pub auto_confirm: bool,
}

/// AI planner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Preferred provider (gemini, claude, ollama)
    pub provider: String,

    /// Model override for the preferred provider
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Base URL override for the preferred provider
    pub base_url: Option<String>,

    /// Maximum planning attempts before falling back to the default plan
    pub max_attempts: u32,

    /// Google AI Studio key
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,

    /// Anthropic key
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
}

/// Slack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Channel name or ID for status messages
    pub channel: Option<String>,

    /// Channel feedback is gathered from by `analyze`
    pub feedback_channel: String,

    /// Web API base URL
    pub base_url: String,

    /// Bot token (xoxb-...)
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
}

/// Notion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Database PRD pages are created in
    pub database_id: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Integration token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// GitHub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository owner
    pub owner: Option<String>,

    /// Repository name
    pub repo: Option<String>,

    /// Extra labels added to every tracking issue
    pub labels: Vec<String>,

    /// Users assigned to every tracking issue
    pub assignees: Vec<String>,

    /// API base URL
    pub base_url: String,

    /// Personal access token
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

/// Google Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Calendar to create review events in
    pub calendar_id: String,

    /// IANA time zone for the review event
    pub time_zone: String,

    /// Days from today until the review
    pub review_offset_days: u32,

    /// Hour of day the review starts
    pub review_hour: u32,

    /// Review length in minutes
    pub duration_minutes: u32,

    /// Attendee email addresses
    pub attendees: Vec<String>,

    /// OAuth client credentials file (installed-app JSON)
    pub credentials_path: Option<PathBuf>,

    /// OAuth token file
    pub token_path: Option<PathBuf>,

    /// API base URL
    pub base_url: String,

    /// OAuth token endpoint
    pub token_url: String,

    /// Pre-issued access token
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.pmflow.toml` in current directory
    /// 2. `~/.config/pmflow/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Find the config file that `load` would read, if any.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(".pmflow.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let global_config = Self::config_dir()?.join("config.toml");
        global_config.exists().then_some(global_config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Overlay credentials and identifiers from the environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn apply_env(&mut self) {
        set_from_env(&mut self.ai.google_api_key, &["GOOGLE_API_KEY"]);
        set_from_env(&mut self.ai.anthropic_api_key, &["ANTHROPIC_API_KEY"]);

        set_from_env(&mut self.slack.bot_token, &["SLACK_BOT_TOKEN"]);
        set_from_env(&mut self.slack.channel, &["SLACK_CHANNEL_ID"]);

        set_from_env(&mut self.notion.api_key, &["NOTION_API_KEY"]);
        set_from_env(&mut self.notion.database_id, &["NOTION_DATABASE_ID"]);

        set_from_env(&mut self.github.token, &["GITHUB_TOKEN", "GH_TOKEN"]);
        set_from_env(&mut self.github.owner, &["GITHUB_REPO_OWNER"]);
        set_from_env(&mut self.github.repo, &["GITHUB_REPO_NAME"]);

        set_from_env(&mut self.calendar.access_token, &["GOOGLE_CALENDAR_ACCESS_TOKEN"]);
        if let Some(id) = env_value(&["GOOGLE_CALENDAR_ID"]) {
            self.calendar.calendar_id = id;
        }
        if let Some(path) = env_value(&["GOOGLE_CALENDAR_CREDENTIALS_PATH"]) {
            self.calendar.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value(&["GOOGLE_CALENDAR_TOKEN_PATH"]) {
            self.calendar.token_path = Some(PathBuf::from(path));
        }
    }

    /// Render the configuration as TOML. Secrets are never included.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Names of the services that have credentials configured.
    pub fn configured_services(&self) -> Vec<&'static str> {
        let mut services = Vec::new();
        if self.ai.google_api_key.is_some() || self.ai.anthropic_api_key.is_some() {
            services.push("ai");
        }
        if self.notion.api_key.is_some() && self.notion.database_id.is_some() {
            services.push("notion");
        }
        if self.github.token.is_some() && self.github.owner.is_some() && self.github.repo.is_some()
        {
            services.push("github");
        }
        if self.slack.bot_token.is_some() && self.slack.channel.is_some() {
            services.push("slack");
        }
        if self.calendar.access_token.is_some() || self.calendar.token_path.is_some() {
            services.push("calendar");
        }
        services
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pmflow"))
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn set_from_env(slot: &mut Option<String>, names: &[&str]) {
    if let Some(value) = env_value(names) {
        *slot = Some(value);
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            feedback_file: PathBuf::from("feedback_analysis.json"),
            output_dir: PathBuf::from("."),
            auto_confirm: false,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            temperature: 0.1,
            base_url: None,
            max_attempts: 3,
            google_api_key: None,
            anthropic_api_key: None,
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: None,
            feedback_channel: "feedback-and-issues".to_string(),
            base_url: "https://slack.com/api".to_string(),
            bot_token: None,
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self { database_id: None, base_url: "https://api.notion.com/v1".to_string(), api_key: None }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            labels: Vec::new(),
            assignees: Vec::new(),
            base_url: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            time_zone: "UTC".to_string(),
            review_offset_days: 7,
            review_hour: 10,
            duration_minutes: 30,
            attendees: Vec::new(),
            credentials_path: None,
            token_path: None,
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            access_token: None,
        }
    }
}
