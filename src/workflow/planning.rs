//! Plan generation.
//!
//! Asks the AI provider chain for a development plan and extracts ordered
//! steps from whatever shape the answer comes back in. Anything unusable
//! falls back to the default plan.

use once_cell::sync::Lazy;
use regex::Regex;

use super::plan::{Plan, PlanSource};
use crate::ai::AIManager;
use crate::core::{retry_async, RetryConfig};
use crate::feedback::Feature;

/// System instruction for the planning model.
pub const PLANNER_SYSTEM: &str = "You are an experienced product manager. \
Turn customer feature requests into short, actionable development plans. \
Answer with a JSON array of step descriptions and nothing else.";

/// Markers that mean the model answered with an error or an unfilled template.
const ERROR_MARKERS: [&str; 3] = ["{$", "Error:", "validation error"];

const STEP_KEYWORDS: [&str; 4] = ["step", "phase", "task", "action"];

/// Build the planning prompt for a feature.
pub fn build_prompt(feature: &Feature) -> String {
    format!(
        "Create a comprehensive product development plan for implementing: {title}\n\
         \n\
         Feature details:\n\
         {description}\n\
         \n\
         Impact score: {impact:.2}\n\
         Priority: {priority}\n\
         Source: {source}\n\
         User: {user}\n\
         \n\
         The plan must cover:\n\
         1. Research and analysis\n\
         2. PRD generation\n\
         3. GitHub issue creation\n\
         4. Stakeholder notifications\n\
         5. Timeline and milestones\n\
         \n\
         Return the plan as a JSON array of strings, one per step.",
        title = feature.title,
        description = feature.description.trim(),
        impact = feature.impact_score,
        priority = feature.priority,
        source = feature.source,
        user = feature.user,
    )
}

/// Whether planner output contains error markers.
pub fn has_error_markers(output: &str) -> bool {
    ERROR_MARKERS.iter().any(|m| output.contains(m))
}

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n(.*?)```").expect("valid regex"));
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•]|\[[ xX]\])\s+(.+?)\s*$").expect("valid regex")
});

/// Extract step descriptions from planner output.
///
/// Tries JSON first (an array of strings or objects, or an object with a
/// `steps` array, optionally inside a code fence), then numbered or bulleted
/// lines, then any line that mentions a step, phase, task or action.
pub fn extract_steps(output: &str) -> Vec<String> {
    if output.trim().is_empty() || has_error_markers(output) {
        return Vec::new();
    }

    if let Some(steps) = json_steps(output).filter(|s| !s.is_empty()) {
        return steps;
    }

    let listed: Vec<String> = output
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| clean(m.as_str())))
        .filter(|s| !s.is_empty())
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    output
        .lines()
        .map(|line| clean(line.trim_start_matches('#')))
        .filter(|line| {
            let lower = line.to_lowercase();
            !line.is_empty() && STEP_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect()
}

fn clean(text: &str) -> String {
    text.replace("**", "").trim().trim_matches('*').trim().to_string()
}

fn json_steps(output: &str) -> Option<Vec<String>> {
    let candidates = [
        FENCE.captures(output).and_then(|c| c.get(1)).map(|m| m.as_str()),
        Some(output.trim()),
        slice_between(output, '[', ']'),
        slice_between(output, '{', '}'),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .and_then(|value| steps_from_value(&value))
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn steps_from_value(value: &serde_json::Value) -> Option<Vec<String>> {
    match value {
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(clean(s)),
                    serde_json::Value::Object(obj) => ["description", "step", "title", "name"]
                        .iter()
                        .find_map(|key| obj.get(*key).and_then(|v| v.as_str()))
                        .map(clean),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        serde_json::Value::Object(obj) => {
            obj.get("steps").or_else(|| obj.get("plan")).and_then(steps_from_value)
        }
        _ => None,
    }
}

/// Plan generator backed by the AI provider chain.
pub struct PlanGenerator<'a> {
    ai: &'a AIManager,
    retry: RetryConfig,
}

impl<'a> PlanGenerator<'a> {
    /// Create a generator making up to `max_attempts` planning attempts.
    pub fn new(ai: &'a AIManager, max_attempts: u32) -> Self {
        Self { ai, retry: RetryConfig::planner(max_attempts) }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Generate a plan for a feature. Never fails; falls back to the default
    /// plan instead.
    pub async fn generate(&self, feature: &Feature) -> Plan {
        let prompt = build_prompt(feature);

        if !self.ai.is_available() {
            tracing::warn!("No AI provider configured, using the default plan");
            return Plan::default_plan(prompt, "no AI provider configured");
        }

        let ai = self.ai;
        let prompt_ref: &str = &prompt;
        let outcome = retry_async(&self.retry, move |attempt| {
            tracing::info!(attempt, "Requesting plan");
            ai.complete(PLANNER_SYSTEM, prompt_ref)
        })
        .await;

        let completion = match outcome.result {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(attempts = outcome.attempts, error = %e, "Planning failed, using the default plan");
                return Plan::default_plan(
                    prompt,
                    format!("planning failed after {} attempts", outcome.attempts),
                );
            }
        };

        if has_error_markers(&completion.text) {
            tracing::warn!(provider = %completion.provider, "Planner output contains errors, using the default plan");
            let mut plan = Plan::default_plan(prompt, "planner output contained errors");
            plan.raw_output = Some(completion.text);
            return plan;
        }

        let steps = extract_steps(&completion.text);
        if steps.is_empty() {
            tracing::warn!(provider = %completion.provider, "No steps in planner output, using the default plan");
            let mut plan = Plan::default_plan(prompt, "no steps found in planner output");
            plan.raw_output = Some(completion.text);
            return plan;
        }

        tracing::info!(provider = %completion.provider, steps = steps.len(), "Plan generated");
        Plan::new(
            prompt,
            Some(completion.text),
            PlanSource::Generated { provider: completion.provider },
            steps,
        )
    }
}
