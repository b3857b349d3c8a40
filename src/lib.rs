//! # pmflow
//!
//! Turn customer feedback into a tracked feature.
//!
//! pmflow reads a feedback analysis, lets a product manager pick a feature
//! request, asks a language model for a development plan, and walks the
//! approved plan out to the team's tools.
//!
//! ## Features
//!
//! - **Feedback analysis**: sentiment and impact scoring of Slack or file feedback
//! - **AI planning**: Gemini, Claude or Ollama with a default-plan fallback
//! - **Human approval**: check, edit, add or regenerate steps before anything ships
//! - **Publishing**: Notion PRD, GitHub issue, Slack message, Google Calendar review
//!
//! ## Quick Start
//!
//! ```bash
//! # Score feedback from a file
//! pmflow analyze --input feedback.json
//!
//! # Run the workflow
//! pmflow run
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::format_push_string)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod ai;
pub mod core;
pub mod feedback;
pub mod integrations;
pub mod workflow;

pub use ai::{AIManager, AIProvider};
pub use core::{ArtifactKind, Config, ExternalLinks};
pub use feedback::{Feature, FeedbackItem};
pub use workflow::{ApprovedPlan, Pipeline, Plan, RunOptions, RunReport, RunStatus, WorkflowError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "pmflow";
