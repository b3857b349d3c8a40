//! Run report written at the end of every run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::plan::ApprovedPlan;
use crate::core::ExternalLinks;
use crate::feedback::Feature;

/// Approved plan artifact.
pub const APPROVED_PLAN_FILE: &str = "approved_plan.json";
/// Rendered PRD artifact.
pub const PRD_FILE: &str = "prd.md";
/// Run report artifact.
pub const RESULTS_FILE: &str = "workflow_results.json";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ApprovedPlan>,
    pub links: ExternalLinks,
    /// Publish steps that did not run, with the reason
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub started_at: String,
    pub timestamp: String,
}

impl RunReport {
    /// Start a report for a new run.
    pub fn new(dry_run: bool) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            status: RunStatus::Aborted,
            error: None,
            dry_run,
            feature: None,
            plan: None,
            links: ExternalLinks::new(),
            skipped: Vec::new(),
            started_at: now.clone(),
            timestamp: now,
        }
    }

    /// Record why a publish step did not run.
    pub fn skip(&mut self, step: &str, reason: impl std::fmt::Display) {
        tracing::warn!(step, %reason, "Skipping publish step");
        self.skipped.push(format!("{}: {}", step, reason));
    }

    /// Stamp the end time and write the report as pretty JSON.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>, path: &Path) -> std::io::Result<()> {
        self.status = status;
        self.error = error;
        self.timestamp = chrono::Utc::now().to_rfc3339();

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), status = %status, "Wrote run report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactKind;

    #[test]
    fn test_report_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);

        let mut report = RunReport::new(false);
        report.links.record(ArtifactKind::Issue, "https://github.com/acme/app/issues/1").unwrap();
        report.skip("calendar", "not configured");
        report.finish(RunStatus::Failed, Some("Slack: rate limited".to_string()), &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "Slack: rate limited");
        assert_eq!(json["links"]["issue"], "https://github.com/acme/app/issues/1");
        assert_eq!(json["skipped"][0], "calendar: not configured");
        assert_eq!(json["run_id"].as_str().unwrap().len(), 36);
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
        assert!(json.get("feature").is_none());
    }
}
