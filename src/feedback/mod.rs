//! Feedback ingestion and feature ranking.
//!
//! Feedback arrives as a JSON analysis file (written by `pmflow analyze` or by
//! hand). Items are scored with [`sentiment`] heuristics when the file does
//! not already carry scores, and ranked by impact for the feature selector.

mod analysis;
pub mod sentiment;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

pub use analysis::{analyze, gather_slack_feedback, FeedbackAnalysis, SentimentDistribution};
pub use sentiment::{
    impact_score, is_feature_request, AiSentimentScorer, KeywordScorer, SentimentScore,
    SentimentScorer,
};

/// Sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Get the display name for this sentiment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Classify a polarity in [-1, 1].
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.1 {
            Self::Positive
        } else if polarity < -0.1 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Feature priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Parse a priority name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" | "urgent" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" | "normal" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Derive a priority from an impact score.
    pub fn from_impact(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.45 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lowercase name, as used in labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Capitalized name, as used in Notion select options.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown priority: {s}")))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// A single piece of user feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Free-text content
    #[serde(default, alias = "content")]
    pub text: String,

    /// Source channel (slack, email, review_site, ...)
    #[serde(default = "unknown")]
    pub source: String,

    /// Sub-channel within the source, such as a Slack channel name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Author
    #[serde(default = "unknown")]
    pub user: String,

    /// When the feedback was given
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,

    /// Sentiment label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,

    /// Sentiment polarity in [-1, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,

    /// Impact score used for ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<f64>,

    /// Explicit priority; unrecognized values are dropped and derived instead
    #[serde(
        default,
        deserialize_with = "lenient_priority",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<Priority>,
}

fn unknown() -> String {
    "unknown".to_string()
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_priority<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Priority>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => {
            let priority = Priority::parse(&s);
            if priority.is_none() {
                tracing::warn!(priority = %s, "Ignoring unknown priority; deriving it from impact");
            }
            priority
        }
        Some(other) => {
            tracing::warn!(priority = %other, "Ignoring non-string priority; deriving it from impact");
            None
        }
    })
}

impl FeedbackItem {
    /// Create an item from text and source.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            channel: None,
            user: unknown(),
            timestamp: None,
            sentiment: None,
            sentiment_score: None,
            impact_score: None,
            priority: None,
        }
    }

    /// Set the author.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Impact score, or zero when unscored.
    pub fn impact(&self) -> f64 {
        self.impact_score.unwrap_or(0.0)
    }

    /// Short title extracted from the text.
    pub fn title(&self) -> String {
        feature_title(&self.text)
    }

    /// Explicit priority, or one derived from the impact score.
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_else(|| Priority::from_impact(self.impact()))
    }
}

/// A feature request chosen by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Short title
    pub title: String,
    /// Full feedback text
    pub description: String,
    /// Impact score
    pub impact_score: f64,
    /// Priority
    pub priority: Priority,
    /// Sentiment label
    pub sentiment: Sentiment,
    /// Where the request came from
    pub source: String,
    /// Who asked for it
    pub user: String,
}

impl From<&FeedbackItem> for Feature {
    fn from(item: &FeedbackItem) -> Self {
        Self {
            title: item.title(),
            description: item.text.clone(),
            impact_score: item.impact(),
            priority: item.effective_priority(),
            sentiment: item.sentiment.unwrap_or(Sentiment::Neutral),
            source: item.source.clone(),
            user: item.user.clone(),
        }
    }
}

/// Error types for feedback loading.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Feedback file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected feedback file in {path}: found {found}, expected an array or an object")]
    UnexpectedShape { path: PathBuf, found: &'static str },
}

/// On-disk shape of a feedback file.
enum FeedbackFile {
    Items(Vec<FeedbackItem>),
    Analysis(AnalysisFile),
}

#[derive(Deserialize)]
struct AnalysisFile {
    #[serde(default)]
    feature_requests: Option<Vec<FeedbackItem>>,
    #[serde(default)]
    feedback_items: Vec<FeedbackItem>,
}

/// Load feature requests from a feedback file.
///
/// Accepts an analysis object (`feature_requests`, falling back to the
/// feature requests found in `feedback_items`) or a bare array of items.
pub fn load_feature_requests(path: &Path) -> Result<Vec<FeedbackItem>, FeedbackError> {
    let items = match read_feedback_file(path)? {
        FeedbackFile::Analysis(AnalysisFile { feature_requests: Some(requests), .. }) => requests,
        FeedbackFile::Analysis(AnalysisFile { feature_requests: None, feedback_items }) => {
            feedback_items.into_iter().filter(|i| is_feature_request(&i.text)).collect()
        }
        FeedbackFile::Items(items) => items,
    };

    tracing::info!(count = items.len(), path = %path.display(), "Loaded feature requests");
    Ok(items)
}

/// Load every feedback item from a file, feature request or not.
pub fn load_feedback(path: &Path) -> Result<Vec<FeedbackItem>, FeedbackError> {
    let items = match read_feedback_file(path)? {
        FeedbackFile::Items(items) => items,
        FeedbackFile::Analysis(analysis) => analysis.feedback_items,
    };
    tracing::info!(count = items.len(), path = %path.display(), "Loaded feedback");
    Ok(items)
}

fn read_feedback_file(path: &Path) -> Result<FeedbackFile, FeedbackError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            FeedbackError::NotFound(path.to_path_buf())
        } else {
            FeedbackError::Io { path: path.to_path_buf(), source }
        }
    })?;

    let invalid = |source: serde_json::Error| FeedbackError::InvalidJson { path: path.to_path_buf(), source };

    // Pick the shape first, then parse from the text so errors keep their line and column.
    match serde_json::from_str::<serde_json::Value>(&content).map_err(invalid)? {
        serde_json::Value::Array(_) => {
            serde_json::from_str(&content).map(FeedbackFile::Items).map_err(invalid)
        }
        serde_json::Value::Object(_) => {
            serde_json::from_str(&content).map(FeedbackFile::Analysis).map_err(invalid)
        }
        other => Err(FeedbackError::UnexpectedShape {
            path: path.to_path_buf(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Load and rank feature requests in one step.
pub fn load_ranked(path: &Path) -> Result<Vec<FeedbackItem>, FeedbackError> {
    Ok(rank_features(load_feature_requests(path)?))
}

/// Score unscored items with the keyword heuristics and sort by impact,
/// highest first. Ties keep their file order.
pub fn rank_features(items: Vec<FeedbackItem>) -> Vec<FeedbackItem> {
    let scorer = KeywordScorer;
    let mut ranked: Vec<FeedbackItem> = items
        .into_iter()
        .map(|mut item| {
            if item.sentiment.is_none() {
                let score = scorer.classify(&item.text);
                item.sentiment = Some(score.sentiment);
                item.sentiment_score.get_or_insert(score.polarity);
            }
            if item.impact_score.is_none() {
                let sentiment = item.sentiment.unwrap_or(Sentiment::Neutral);
                item.impact_score = Some(impact_score(sentiment, &item.text));
            }
            item
        })
        .collect();

    ranked.sort_by(|a, b| b.impact().partial_cmp(&a.impact()).unwrap_or(Ordering::Equal));
    ranked
}

/// Extract a short title from feedback text.
///
/// Uses the first non-empty line that is not a quote, truncated to 50
/// characters.
pub fn feature_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('>'))
        .map(|line| {
            if line.chars().count() > 50 {
                let truncated: String = line.chars().take(50).collect();
                format!("{}...", truncated.trim_end())
            } else {
                line.to_string()
            }
        })
        .unwrap_or_else(|| "New Feature Request".to_string())
}
