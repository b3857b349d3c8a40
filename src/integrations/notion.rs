//! Notion integration.
//!
//! Publishes the PRD as a page in a Notion database. The database schema is
//! read first so the page properties match whatever the team's database
//! calls its title, status and priority columns.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::NotionConfig;
use crate::feedback::Priority;

/// Notion API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Maximum characters in one rich text object.
pub const MAX_TEXT_LEN: usize = 2000;

/// Maximum children per append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Notion API client bound to one database.
#[derive(Debug, Clone)]
pub struct NotionClient {
    /// Integration token
    token: String,
    /// Target database
    database_id: String,
    /// API base URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// A created page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page ID
    pub id: String,
    /// Page URL
    pub url: String,
}

/// Database schema, as returned by `GET /databases/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
}

/// One database property.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertySchema {
    /// Property type (title, select, status, ...)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub select: Option<OptionList>,
    #[serde(default)]
    pub status: Option<OptionList>,
}

/// Options of a select or status property.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionList {
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

/// A select or status option.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

impl PropertySchema {
    fn options(&self) -> &[SelectOption] {
        let list = match self.kind.as_str() {
            "status" => self.status.as_ref(),
            "select" => self.select.as_ref(),
            _ => None,
        };
        list.map(|l| l.options.as_slice()).unwrap_or(&[])
    }
}

impl DatabaseSchema {
    /// Name of the title property, `Name` when the schema has none.
    pub fn title_property(&self) -> String {
        self.properties
            .iter()
            .find(|(_, p)| p.kind == "title")
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "Name".to_string())
    }

    /// Status property, its type, and its first option.
    ///
    /// A `status` property wins; otherwise a `select` whose name mentions
    /// "status". Properties without options are skipped.
    pub fn status_property(&self) -> Option<(&str, &str, &str)> {
        let candidates = self.properties.iter().filter(|(name, p)| {
            p.kind == "status" || (p.kind == "select" && name.to_lowercase().contains("status"))
        });

        let mut best: Option<(&str, &str, &str)> = None;
        for (name, prop) in candidates {
            let Some(first) = prop.options().first() else {
                tracing::warn!(property = %name, "Status property has no options, skipping");
                continue;
            };
            let found = (name.as_str(), prop.kind.as_str(), first.name.as_str());
            if prop.kind == "status" {
                return Some(found);
            }
            best.get_or_insert(found);
        }
        best
    }

    /// Priority select property and the option matching `priority`.
    pub fn priority_property(&self, priority: Priority) -> Option<(&str, &str)> {
        self.properties
            .iter()
            .filter(|(name, p)| p.kind == "select" && name.to_lowercase().contains("priority"))
            .find_map(|(name, p)| {
                p.options()
                    .iter()
                    .find(|o| o.name.eq_ignore_ascii_case(priority.name()))
                    .map(|o| (name.as_str(), o.name.as_str()))
            })
    }

    /// Page properties for a new PRD page.
    pub fn page_properties(&self, title: &str, priority: Priority) -> serde_json::Value {
        let mut properties = serde_json::Map::new();

        properties.insert(
            self.title_property(),
            serde_json::json!({ "title": rich_text(title) }),
        );

        if let Some((name, kind, option)) = self.status_property() {
            properties.insert(name.to_string(), serde_json::json!({ kind: { "name": option } }));
        }

        if let Some((name, option)) = self.priority_property(priority) {
            properties.insert(name.to_string(), serde_json::json!({ "select": { "name": option } }));
        }

        serde_json::Value::Object(properties)
    }
}

/// Result type for Notion operations.
pub type NotionResult<T> = Result<T, NotionError>;

/// Error types for Notion operations.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notion API error: {message} ({code}, status: {status})")]
    Api { status: u16, code: String, message: String },

    #[error("Notion token is missing or invalid")]
    Unauthorized,

    #[error("Not found or not shared with the integration: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl NotionClient {
    /// Create a new Notion client.
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            base_url: "https://api.notion.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from configuration. Needs both the token and the database.
    pub fn from_config(config: &NotionConfig) -> Option<Self> {
        let token = config.api_key.as_ref()?;
        let database_id = config.database_id.as_ref()?;
        Some(Self::new(token.clone(), database_id.clone()).with_base_url(&config.base_url))
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Make an authenticated request.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Parse error response from the Notion API.
    async fn parse_error(&self, response: reqwest::Response) -> NotionError {
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.unwrap_or_default();

        match status {
            401 => NotionError::Unauthorized,
            404 => NotionError::NotFound(str_field(&body, "message")),
            429 => NotionError::RateLimited,
            _ => NotionError::Api {
                status,
                code: str_field(&body, "code"),
                message: str_field(&body, "message"),
            },
        }
    }

    /// Retrieve the database schema.
    pub async fn retrieve_database(&self) -> NotionResult<DatabaseSchema> {
        let path = format!("databases/{}", self.database_id);
        let response = self.request(reqwest::Method::GET, &path).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let schema: DatabaseSchema = response.json().await?;
        tracing::debug!(properties = ?schema.properties.keys().collect::<Vec<_>>(), "Notion database schema");
        Ok(schema)
    }

    /// Create a page in the database with the given properties.
    pub async fn create_page(&self, properties: serde_json::Value) -> NotionResult<Page> {
        let body = serde_json::json!({
            "parent": { "database_id": self.database_id },
            "properties": properties
        });

        let response = self.request(reqwest::Method::POST, "pages").json(&body).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let page: Page = response.json().await?;
        Ok(page)
    }

    /// Append blocks to a page, at most 100 per request.
    pub async fn append_blocks(
        &self,
        page_id: &str,
        blocks: &[serde_json::Value],
    ) -> NotionResult<()> {
        let path = format!("blocks/{}/children", page_id);

        for batch in blocks.chunks(MAX_BLOCKS_PER_REQUEST) {
            let body = serde_json::json!({ "children": batch });
            let response = self.request(reqwest::Method::PATCH, &path).json(&body).send().await?;

            if !response.status().is_success() {
                return Err(self.parse_error(response).await);
            }
        }

        Ok(())
    }

    /// Create a PRD page and fill it with the rendered markdown.
    pub async fn publish_prd(
        &self,
        title: &str,
        priority: Priority,
        markdown: &str,
    ) -> NotionResult<Page> {
        let schema = self.retrieve_database().await?;
        let page = self.create_page(schema.page_properties(title, priority)).await?;

        let blocks = markdown_to_blocks(markdown);
        self.append_blocks(&page.id, &blocks).await?;

        tracing::info!(page = %page.id, blocks = blocks.len(), "Published PRD to Notion");
        Ok(page)
    }
}

fn str_field(body: &serde_json::Value, key: &str) -> String {
    body.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

/// Rich text array for `text`, split into 2000-character pieces.
pub fn rich_text(text: &str) -> Vec<serde_json::Value> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    chars
        .chunks(MAX_TEXT_LEN)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            serde_json::json!({ "type": "text", "text": { "content": content } })
        })
        .collect()
}

/// Rich text for a block line, turning `**bold**` spans into bold annotations.
///
/// Unbalanced markers are kept as literal text.
pub fn inline_rich_text(text: &str) -> Vec<serde_json::Value> {
    let parts: Vec<&str> = text.split("**").collect();
    if parts.len() % 2 == 0 {
        return rich_text(text);
    }

    parts
        .iter()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .flat_map(|(i, part)| {
            let mut segments = rich_text(part);
            if i % 2 == 1 {
                for segment in &mut segments {
                    segment["annotations"] = serde_json::json!({ "bold": true });
                }
            }
            segments
        })
        .collect()
}

fn text_block(kind: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "block",
        "type": kind,
        kind: { "rich_text": inline_rich_text(text) }
    })
}

static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s+(.*)$").expect("valid regex"));

/// Convert rendered markdown into Notion blocks.
///
/// Understands headings, checkboxes, bullets, numbered items, quotes and
/// dividers. Every other non-empty line becomes a paragraph.
pub fn markdown_to_blocks(markdown: &str) -> Vec<serde_json::Value> {
    let mut blocks = Vec::new();

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let block = if let Some(text) = trimmed.strip_prefix("### ") {
            text_block("heading_3", text)
        } else if let Some(text) = trimmed.strip_prefix("## ") {
            text_block("heading_2", text)
        } else if let Some(text) = trimmed.strip_prefix("# ") {
            text_block("heading_1", text)
        } else if let Some((checked, text)) = checkbox(trimmed) {
            serde_json::json!({
                "object": "block",
                "type": "to_do",
                "to_do": { "rich_text": inline_rich_text(text), "checked": checked }
            })
        } else if let Some(text) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
        {
            text_block("bulleted_list_item", text)
        } else if let Some(caps) = NUMBERED.captures(trimmed) {
            text_block("numbered_list_item", caps.get(1).map_or("", |m| m.as_str()))
        } else if let Some(text) = trimmed.strip_prefix("> ") {
            text_block("quote", text)
        } else if trimmed == "---" {
            serde_json::json!({ "object": "block", "type": "divider", "divider": {} })
        } else {
            text_block("paragraph", trimmed)
        };

        blocks.push(block);
    }

    blocks
}

fn checkbox(line: &str) -> Option<(bool, &str)> {
    let rest = line.strip_prefix("- [").or_else(|| line.strip_prefix("* ["))?;
    let (mark, text) = rest.split_once("] ")?;
    match mark {
        " " => Some((false, text)),
        "x" | "X" => Some((true, text)),
        _ => None,
    }
}
