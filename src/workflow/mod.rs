//! The feedback-to-feature workflow.
//!
//! Strictly sequential: pick a feature, generate and review a plan, render
//! the PRD, then publish to each configured service in turn.
//!
//! ## Artifacts
//!
//! - `approved_plan.json` - the feature and the plan as approved
//! - `prd.md` - the rendered PRD
//! - `workflow_results.json` - run status and the links created

pub mod console;
mod editor;
mod pipeline;
mod plan;
mod planning;
mod prd;
mod report;
mod selector;

pub use console::Console;
pub use editor::{review_plan, EditorOutcome};
pub use pipeline::{Pipeline, RunOptions};
pub use plan::{ApprovedPlan, Plan, PlanSource, PlanStep, DEFAULT_STEPS};
pub use planning::{build_prompt, extract_steps, PlanGenerator, PLANNER_SYSTEM};
pub use prd::PrdDocument;
pub use report::{RunReport, RunStatus, APPROVED_PLAN_FILE, PRD_FILE, RESULTS_FILE};
pub use selector::{preselect, render_features, select_feature};

use crate::core::LinksError;
use crate::feedback::FeedbackError;
use crate::integrations::{CalendarError, IssuesError, NotionError, SlackError};

/// Errors raised while running the workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("No feature requests to choose from")]
    NoFeatures,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Step {number} does not exist (the plan has {count} steps)")]
    InvalidStep { number: usize, count: usize },

    #[error("Cannot approve: at least one step must be included")]
    NoIncludedSteps,

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error(transparent)]
    Links(#[from] LinksError),

    #[error("Notion: {0}")]
    Notion(#[from] NotionError),

    #[error("GitHub: {0}")]
    GitHub(#[from] IssuesError),

    #[error("Slack: {0}")]
    Slack(#[from] SlackError),

    #[error("Google Calendar: {0}")]
    Calendar(#[from] CalendarError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
