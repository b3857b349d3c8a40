//! External integrations module.
//!
//! Clients for the services a feature is published to: Notion for the PRD,
//! GitHub for the tracking issue, Slack for the status message and
//! Google Calendar for the review meeting.

pub mod calendar;
pub mod github_issues;
pub mod notifications;
pub mod notion;
pub mod slack;

pub use calendar::{
    today_in, CalendarClient, CalendarError, CalendarResult, CreatedEvent, ReviewEvent,
};
pub use github_issues::{
    feature_issue, feature_issue_body, feature_labels, CreateIssueOptions, GitHubIssues, Issue,
    IssueComment, IssueState, IssuesError, IssuesResult, Label, ListIssuesOptions,
    UpdateIssueOptions,
};
pub use notifications::{MessageField, NotificationMessage};
pub use notion::{markdown_to_blocks, DatabaseSchema, NotionClient, NotionError, NotionResult, Page};
pub use slack::{PostedMessage, SlackClient, SlackError, SlackMessage, SlackResult};
