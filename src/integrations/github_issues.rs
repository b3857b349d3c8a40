//! GitHub Issues integration.
//!
//! Opens the tracking issue for an approved feature and lets the operator
//! close or reopen it later from the `issue` command.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::GitHubConfig;
use crate::feedback::Feature;

/// GitHub Issues API client.
#[derive(Debug, Clone)]
pub struct GitHubIssues {
    /// GitHub API token
    token: String,
    /// Repository owner
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// A GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Issue body/description
    #[serde(default)]
    pub body: Option<String>,
    /// Issue state (open, closed)
    pub state: String,
    /// Issue labels
    #[serde(default)]
    pub labels: Vec<Label>,
    /// HTML URL to the issue
    pub html_url: String,
    /// Created timestamp
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Issue {
    /// Label names, comma separated.
    pub fn label_names(&self) -> String {
        self.labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join(", ")
    }
}

/// A GitHub label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
}

/// Options for creating a new issue.
#[derive(Debug, Clone, Default)]
pub struct CreateIssueOptions {
    /// Issue title (required)
    pub title: String,
    /// Issue body/description
    pub body: Option<String>,
    /// Labels to add
    pub labels: Vec<String>,
    /// Assignees to add
    pub assignees: Vec<String>,
}

/// Options for listing issues.
#[derive(Debug, Clone)]
pub struct ListIssuesOptions {
    /// Filter by state: open, closed, all
    pub state: String,
    /// Only issues carrying all of these labels
    pub labels: Vec<String>,
    /// Maximum number of results
    pub per_page: Option<u32>,
}

impl Default for ListIssuesOptions {
    fn default() -> Self {
        Self {
            state: "open".to_string(),
            labels: vec!["feature-request".to_string()],
            per_page: None,
        }
    }
}

/// Options for updating an issue.
#[derive(Debug, Clone, Default)]
pub struct UpdateIssueOptions {
    /// New title
    pub title: Option<String>,
    /// New body
    pub body: Option<String>,
    /// New state (open, closed)
    pub state: Option<String>,
    /// Labels to set (replaces existing)
    pub labels: Option<Vec<String>>,
}

/// A comment on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    /// Comment ID
    pub id: u64,
    /// Comment body
    pub body: String,
    /// HTML URL to the comment
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Result type for GitHub Issues operations.
pub type IssuesResult<T> = Result<T, IssuesError>;

/// Error types for GitHub Issues operations.
#[derive(Debug, thiserror::Error)]
pub enum IssuesError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GitHubIssues {
    /// Create a new GitHub Issues client.
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            base_url: "https://api.github.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from configuration.
    ///
    /// Returns `None` unless the token, owner and repository are all set.
    pub fn from_config(config: &GitHubConfig) -> Option<Self> {
        let token = config.token.as_ref()?;
        let owner = config.owner.as_ref()?;
        let repo = config.repo.as_ref()?;
        Some(Self::new(token.clone(), owner.clone(), repo.clone()).with_base_url(&config.base_url))
    }

    /// Use a different API base URL (GitHub Enterprise, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Get the API URL for a path in this repository.
    fn api_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.base_url, self.owner, self.repo, path)
    }

    /// Make an authenticated request.
    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "pmflow")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Parse error response from GitHub API.
    async fn parse_error(&self, response: reqwest::Response) -> IssuesError {
        let status = response.status().as_u16();

        match status {
            401 => IssuesError::Unauthorized,
            403 | 429 => {
                let exhausted = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s == "0")
                    .unwrap_or(false);
                if exhausted || status == 429 {
                    return IssuesError::RateLimited;
                }
                IssuesError::Api { status, message: "Forbidden".to_string() }
            }
            404 => IssuesError::NotFound(format!("{} or resource", self.full_name())),
            _ => {
                let message = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or_else(|| format!("HTTP {}", status));
                IssuesError::Api { status, message }
            }
        }
    }

    /// List issues in the repository.
    ///
    /// GitHub's issues endpoint also returns pull requests; those are dropped.
    pub async fn list_issues(&self, options: ListIssuesOptions) -> IssuesResult<Vec<Issue>> {
        let mut params = vec![format!("state={}", urlencoding::encode(&options.state))];
        if !options.labels.is_empty() {
            params.push(format!("labels={}", urlencoding::encode(&options.labels.join(","))));
        }
        if let Some(per_page) = options.per_page {
            params.push(format!("per_page={}", per_page));
        }
        let url = format!("{}?{}", self.api_url("issues"), params.join("&"));

        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let items: Vec<serde_json::Value> = response.json().await?;
        let issues = items
            .into_iter()
            .filter(|item| item.get("pull_request").is_none())
            .filter_map(|item| serde_json::from_value::<Issue>(item).ok())
            .collect::<Vec<_>>();
        tracing::debug!(count = issues.len(), "Listed GitHub issues");
        Ok(issues)
    }

    /// Get a specific issue by number.
    pub async fn get_issue(&self, issue_number: u64) -> IssuesResult<Issue> {
        let url = self.api_url(&format!("issues/{}", issue_number));

        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let issue: Issue = response.json().await?;
        Ok(issue)
    }

    /// Create a new issue.
    pub async fn create_issue(&self, options: CreateIssueOptions) -> IssuesResult<Issue> {
        if options.title.trim().is_empty() {
            return Err(IssuesError::InvalidInput("Title is required".to_string()));
        }

        let url = self.api_url("issues");

        let mut body: HashMap<&str, serde_json::Value> = HashMap::new();
        body.insert("title", serde_json::json!(options.title));

        if let Some(desc) = &options.body {
            body.insert("body", serde_json::json!(desc));
        }
        if !options.labels.is_empty() {
            body.insert("labels", serde_json::json!(options.labels));
        }
        if !options.assignees.is_empty() {
            body.insert("assignees", serde_json::json!(options.assignees));
        }

        let response = self.request(reqwest::Method::POST, &url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let issue: Issue = response.json().await?;
        tracing::info!(number = issue.number, url = %issue.html_url, "Created GitHub issue");
        Ok(issue)
    }

    /// Update an existing issue.
    pub async fn update_issue(
        &self,
        issue_number: u64,
        options: UpdateIssueOptions,
    ) -> IssuesResult<Issue> {
        let url = self.api_url(&format!("issues/{}", issue_number));

        let mut body: HashMap<&str, serde_json::Value> = HashMap::new();

        if let Some(title) = &options.title {
            body.insert("title", serde_json::json!(title));
        }
        if let Some(desc) = &options.body {
            body.insert("body", serde_json::json!(desc));
        }
        if let Some(state) = &options.state {
            body.insert("state", serde_json::json!(state));
        }
        if let Some(labels) = &options.labels {
            body.insert("labels", serde_json::json!(labels));
        }

        let response = self.request(reqwest::Method::PATCH, &url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let issue: Issue = response.json().await?;
        Ok(issue)
    }

    /// Close an issue.
    pub async fn close_issue(&self, issue_number: u64) -> IssuesResult<Issue> {
        self.update_issue(
            issue_number,
            UpdateIssueOptions { state: Some("closed".to_string()), ..Default::default() },
        )
        .await
    }

    /// Reopen an issue.
    pub async fn reopen_issue(&self, issue_number: u64) -> IssuesResult<Issue> {
        self.update_issue(
            issue_number,
            UpdateIssueOptions { state: Some("open".to_string()), ..Default::default() },
        )
        .await
    }

    /// Add a comment to an issue.
    pub async fn add_comment(&self, issue_number: u64, body: &str) -> IssuesResult<IssueComment> {
        let url = self.api_url(&format!("issues/{}/comments", issue_number));

        let payload = serde_json::json!({ "body": body });

        let response = self.request(reqwest::Method::POST, &url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(self.parse_error(response).await);
        }

        let comment: IssueComment = response.json().await?;
        Ok(comment)
    }

    /// Move an issue to `state` (open or closed), commenting first when a
    /// comment is given. Reopen comments are prefixed with `Reopened: `.
    ///
    /// An issue already in `state` is returned untouched, comment included.
    pub async fn set_state(
        &self,
        issue_number: u64,
        state: IssueState,
        comment: Option<&str>,
    ) -> IssuesResult<Issue> {
        let current = self.get_issue(issue_number).await?;
        if current.state == state.to_string() {
            tracing::info!(number = issue_number, state = %state, "GitHub issue already in state");
            return Ok(current);
        }

        if let Some(text) = comment.filter(|c| !c.trim().is_empty()) {
            let text = match state {
                IssueState::Open => format!("Reopened: {}", text),
                IssueState::Closed => text.to_string(),
            };
            self.add_comment(issue_number, &text).await?;
        }
        let issue = match state {
            IssueState::Open => self.reopen_issue(issue_number).await?,
            IssueState::Closed => self.close_issue(issue_number).await?,
        };
        tracing::info!(number = issue_number, state = %issue.state, "Updated GitHub issue");
        Ok(issue)
    }
}

/// Target state for [`GitHubIssues::set_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

static FRONTEND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(ui|ux|interface|design|frontend)\b").expect("valid regex"));
static BACKEND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(api|integration|backend|server)\b").expect("valid regex"));
static MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(mobile|app|ios|android)\b").expect("valid regex"));

/// Labels for a feature's tracking issue.
pub fn feature_labels(feature: &Feature) -> Vec<String> {
    let mut labels = vec![
        "enhancement".to_string(),
        "feature-request".to_string(),
        format!("priority: {}", feature.priority.name()),
    ];

    let title = feature.title.to_lowercase();
    if FRONTEND.is_match(&title) {
        labels.push("frontend".to_string());
    }
    if BACKEND.is_match(&title) {
        labels.push("backend".to_string());
    }
    if MOBILE.is_match(&title) {
        labels.push("mobile".to_string());
    }

    labels
}

/// Markdown body of a feature's tracking issue.
pub fn feature_issue_body(feature: &Feature, steps: &[String], prd_url: Option<&str>) -> String {
    let mut body = String::new();

    body.push_str("## Feature Description\n\n");
    body.push_str(feature.description.trim());
    body.push_str("\n\n");

    body.push_str(&format!("## Priority: {}\n\n", feature.priority.title()));
    body.push_str(&format!("**Impact Score:** {:.2}\n", feature.impact_score));
    body.push_str(&format!("**Sentiment:** {}\n", feature.sentiment));
    body.push_str(&format!("**Requested by:** {} via {}\n\n", feature.user, feature.source));

    if !steps.is_empty() {
        body.push_str("## Development Plan\n\n");
        for step in steps {
            body.push_str(&format!("- [ ] {}\n", step));
        }
        body.push('\n');
    }

    body.push_str("## Acceptance Criteria\n\n");
    for criterion in [
        "Functionality works as described",
        "Performance meets requirements",
        "UI/UX meets design standards",
        "Documentation is complete",
        "Testing coverage is adequate",
    ] {
        body.push_str(&format!("- [ ] {}\n", criterion));
    }
    body.push('\n');

    if let Some(url) = prd_url {
        body.push_str(&format!("## Product Requirements\n\n[PRD]({})\n\n", url));
    }

    body.push_str("---\n_Generated from user feedback analysis by pmflow._\n");
    body
}

/// Issue creation options for a feature.
pub fn feature_issue(
    feature: &Feature,
    steps: &[String],
    prd_url: Option<&str>,
    config: &GitHubConfig,
) -> CreateIssueOptions {
    let mut labels = feature_labels(feature);
    for extra in &config.labels {
        if !labels.contains(extra) {
            labels.push(extra.clone());
        }
    }

    CreateIssueOptions {
        title: format!("Feature: {}", feature.title),
        body: Some(feature_issue_body(feature, steps, prd_url)),
        labels,
        assignees: config.assignees.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{Priority, Sentiment};

    fn feature(title: &str) -> Feature {
        Feature {
            title: title.to_string(),
            description: "Customers want to export reports.".to_string(),
            impact_score: 0.734,
            priority: Priority::High,
            sentiment: Sentiment::Negative,
            source: "slack".to_string(),
            user: "U42".to_string(),
        }
    }

    #[test]
    fn test_api_url() {
        let client = GitHubIssues::new("token", "owner", "repo");
        assert_eq!(client.api_url("issues"), "https://api.github.com/repos/owner/repo/issues");
        assert_eq!(client.api_url("issues/123"), "https://api.github.com/repos/owner/repo/issues/123");

        let client = client.with_base_url("http://127.0.0.1:8080/");
        assert_eq!(client.api_url("issues"), "http://127.0.0.1:8080/repos/owner/repo/issues");
    }

    #[test]
    fn test_from_config_requires_all_fields() {
        let mut config = GitHubConfig::default();
        config.token = Some("t".to_string());
        config.owner = Some("acme".to_string());
        assert!(GitHubIssues::from_config(&config).is_none());

        config.repo = Some("app".to_string());
        assert_eq!(GitHubIssues::from_config(&config).unwrap().full_name(), "acme/app");
    }

    #[test]
    fn test_feature_labels() {
        let labels = feature_labels(&feature("Public API for mobile dashboards"));
        assert_eq!(
            labels,
            vec!["enhancement", "feature-request", "priority: high", "backend", "mobile"]
        );
    }

    #[test]
    fn test_feature_labels_word_boundaries() {
        // "guide" contains "ui", "happy" contains "app"
        let labels = feature_labels(&feature("Onboarding guide for happy customers"));
        assert_eq!(labels, vec!["enhancement", "feature-request", "priority: high"]);

        let labels = feature_labels(&feature("New UI for settings"));
        assert!(labels.contains(&"frontend".to_string()));
    }

    #[test]
    fn test_issue_body() {
        let steps = vec!["Research".to_string(), "Write PRD".to_string()];
        let body = feature_issue_body(&feature("Excel export"), &steps, Some("https://notion.so/p"));

        assert!(body.contains("Customers want to export reports."));
        assert!(body.contains("## Priority: High"));
        assert!(body.contains("**Impact Score:** 0.73"));
        assert!(body.contains("**Sentiment:** negative"));
        assert!(body.contains("- [ ] Research\n- [ ] Write PRD"));
        assert!(body.contains("## Acceptance Criteria"));
        assert!(body.contains("[PRD](https://notion.so/p)"));
    }

    #[test]
    fn test_issue_body_without_prd() {
        let body = feature_issue_body(&feature("Excel export"), &[], None);
        assert!(!body.contains("Product Requirements"));
        assert!(!body.contains("Development Plan"));
    }

    #[test]
    fn test_feature_issue_merges_config_labels() {
        let mut config = GitHubConfig::default();
        config.labels = vec!["from-feedback".to_string(), "enhancement".to_string()];
        config.assignees = vec!["octocat".to_string()];

        let options = feature_issue(&feature("Excel export"), &[], None, &config);
        assert_eq!(options.title, "Feature: Excel export");
        assert_eq!(options.labels.iter().filter(|l| *l == "enhancement").count(), 1);
        assert!(options.labels.contains(&"from-feedback".to_string()));
        assert_eq!(options.assignees, vec!["octocat"]);
    }
}
