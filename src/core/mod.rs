//! Core types shared across the workflow: configuration, artifact links, and
//! retry handling.

mod config;
mod links;
mod retry;

pub use config::{
    expand_path, AiConfig, CalendarConfig, Config, GeneralConfig, GitHubConfig, NotionConfig,
    SlackConfig,
};
pub use links::{ArtifactKind, ExternalLinks, LinksError};
pub use retry::{retry_async, RetryConfig, RetryOutcome};
