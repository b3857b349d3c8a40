//! Development plans and their approval.
//!
//! A [`Plan`] is edited by the operator and frozen into an [`ApprovedPlan`]
//! on approval. Publishers only take the approved form.

use serde::{Deserialize, Serialize};

use super::WorkflowError;

/// Steps used when the planning model is unavailable or unusable.
pub const DEFAULT_STEPS: [&str; 4] = [
    "Conduct research and analysis",
    "Generate Product Requirements Document (PRD)",
    "Create GitHub issues for tasks",
    "Notify stakeholders about the project",
];

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Stable ID (`step_N`)
    pub id: String,
    /// What to do
    pub description: String,
    /// Whether the step is part of the plan
    pub included: bool,
    /// Whether the operator changed the description or added the step
    pub edited: bool,
    /// Planner's description before the first edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl PlanStep {
    fn new(number: usize, description: impl Into<String>) -> Self {
        Self {
            id: format!("step_{}", number),
            description: description.into(),
            included: true,
            edited: false,
            original: None,
        }
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSource {
    /// Answered by a planning model
    Generated { provider: String },
    /// Built-in default steps
    Default { reason: String },
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generated { provider } => write!(f, "generated by {}", provider),
            Self::Default { reason } => write!(f, "default plan ({})", reason),
        }
    }
}

/// A plan under review.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Prompt sent to the planning model
    pub prompt: String,
    /// Raw model output, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    pub source: PlanSource,
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan from step descriptions.
    pub fn new(
        prompt: impl Into<String>,
        raw_output: Option<String>,
        source: PlanSource,
        descriptions: Vec<String>,
    ) -> Self {
        let steps = descriptions
            .into_iter()
            .enumerate()
            .map(|(i, d)| PlanStep::new(i + 1, d))
            .collect();
        Self { prompt: prompt.into(), raw_output, source, steps }
    }

    /// The built-in default plan.
    pub fn default_plan(prompt: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            prompt,
            None,
            PlanSource::Default { reason: reason.into() },
            DEFAULT_STEPS.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the plan was produced by the fallback.
    pub fn is_default(&self) -> bool {
        matches!(self.source, PlanSource::Default { .. })
    }

    fn step_mut(&mut self, number: usize) -> Result<&mut PlanStep, WorkflowError> {
        let count = self.steps.len();
        number
            .checked_sub(1)
            .and_then(|i| self.steps.get_mut(i))
            .ok_or(WorkflowError::InvalidStep { number, count })
    }

    /// Toggle inclusion of step `number` (1-based). Returns the new state.
    pub fn toggle(&mut self, number: usize) -> Result<bool, WorkflowError> {
        let step = self.step_mut(number)?;
        step.included = !step.included;
        Ok(step.included)
    }

    /// Replace the description of step `number` (1-based).
    ///
    /// Blank input keeps the current description.
    pub fn edit(&mut self, number: usize, description: &str) -> Result<bool, WorkflowError> {
        let step = self.step_mut(number)?;
        let description = description.trim();
        if description.is_empty() || description == step.description {
            return Ok(false);
        }
        if step.original.is_none() && !step.edited {
            step.original = Some(step.description.clone());
        }
        step.description = description.to_string();
        step.edited = true;
        Ok(true)
    }

    /// Append a step. Blank input adds nothing.
    pub fn add(&mut self, description: &str) -> Option<&PlanStep> {
        let description = description.trim();
        if description.is_empty() {
            return None;
        }
        let mut step = PlanStep::new(self.steps.len() + 1, description);
        step.edited = true;
        self.steps.push(step);
        self.steps.last()
    }

    /// Freeze the plan. Needs at least one included step; excluded steps are
    /// dropped.
    pub fn approve(&self) -> Result<ApprovedPlan, WorkflowError> {
        let steps: Vec<PlanStep> = self.steps.iter().filter(|s| s.included).cloned().collect();
        if steps.is_empty() {
            return Err(WorkflowError::NoIncludedSteps);
        }
        Ok(ApprovedPlan {
            prompt: self.prompt.clone(),
            source: self.source.clone(),
            steps,
            approved_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Numbered listing with inclusion and edit markers.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            let mark = if step.included { "[x]" } else { "[ ]" };
            let modified = if step.edited { " (modified)" } else { "" };
            out.push_str(&format!("{:>3}. {} {}{}\n", i + 1, mark, step.description, modified));
        }
        out
    }
}

/// A plan the operator approved. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovedPlan {
    prompt: String,
    source: PlanSource,
    steps: Vec<PlanStep>,
    approved_at: String,
}

impl ApprovedPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Step descriptions in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.description.clone()).collect()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn source(&self) -> &PlanSource {
        &self.source
    }

    /// RFC 3339 approval time.
    pub fn approved_at(&self) -> &str {
        &self.approved_at
    }
}
