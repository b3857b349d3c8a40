//! Links to the artifacts a run creates in external services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of external artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// PRD page in Notion
    Document,
    /// Tracking issue on GitHub
    Issue,
    /// Status message in Slack
    Notification,
    /// Review event in Google Calendar
    CalendarEvent,
}

impl ArtifactKind {
    /// Get the display name for this artifact kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Issue => "issue",
            Self::Notification => "notification",
            Self::CalendarEvent => "calendar_event",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Document => "PRD",
            Self::Issue => "Issue",
            Self::Notification => "Slack message",
            Self::CalendarEvent => "Review meeting",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error recording a link.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinksError {
    #[error("A {0} was already created in this run")]
    AlreadyRecorded(ArtifactKind),
}

/// Append-only map from artifact kind to URL.
///
/// There is no removal API: once recorded, a link stays for the rest of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalLinks {
    links: BTreeMap<ArtifactKind, String>,
}

impl ExternalLinks {
    /// Create an empty set of links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the link for an artifact. Each kind can be recorded once.
    pub fn record(&mut self, kind: ArtifactKind, url: impl Into<String>) -> Result<(), LinksError> {
        if self.links.contains_key(&kind) {
            return Err(LinksError::AlreadyRecorded(kind));
        }
        self.links.insert(kind, url.into());
        Ok(())
    }

    /// Get the link for an artifact kind.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        self.links.get(&kind).map(String::as_str)
    }

    /// Whether an artifact of this kind was already created.
    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.links.contains_key(&kind)
    }

    /// Iterate over recorded links in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        self.links.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of recorded links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
