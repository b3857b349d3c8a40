//! Product Requirements Document rendering.

use std::path::Path;

use serde::Serialize;

use super::plan::ApprovedPlan;
use crate::feedback::Feature;

/// A rendered PRD. Built once from an approved plan; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrdDocument {
    title: String,
    markdown: String,
}

impl PrdDocument {
    /// Render the PRD for a feature and its approved plan.
    pub fn render(feature: &Feature, plan: &ApprovedPlan) -> Self {
        let title = format!("PRD: {}", feature.title);
        let mut md = format!("# {}\n\n", title);

        md.push_str("## Overview\n\n");
        md.push_str(&format!(
            "This document describes **{}**, requested by {} via {}. \
             It was approved on {}.\n\n",
            feature.title,
            feature.user,
            feature.source,
            plan.approved_at()
        ));

        md.push_str("## Problem Statement\n\n");
        for line in feature.description.lines().filter(|l| !l.trim().is_empty()) {
            md.push_str(&format!("> {}\n", line.trim()));
        }
        md.push('\n');

        md.push_str("## Customer Signal\n\n");
        md.push_str(&format!("- Priority: {}\n", feature.priority.title()));
        md.push_str(&format!("- Impact score: {:.2}\n", feature.impact_score));
        md.push_str(&format!("- Sentiment: {}\n\n", feature.sentiment));

        md.push_str("## Development Plan\n\n");
        for (i, step) in plan.steps().iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, step.description));
        }
        md.push('\n');

        md.push_str("## Requirements\n\n");
        md.push_str(&format!("- Deliver {} as described in the problem statement\n", feature.title));
        md.push_str("- Integrate with existing systems and workflows\n");
        md.push_str("- Meet current performance, security and accessibility standards\n\n");

        md.push_str("## Acceptance Criteria\n\n");
        for criterion in [
            "Feature implemented according to this document",
            "Integration tested with all affected systems",
            "Performance meets defined benchmarks",
            "Documentation complete and accurate",
        ] {
            md.push_str(&format!("- [ ] {}\n", criterion));
        }
        md.push('\n');

        md.push_str("## Success Metrics\n\n");
        md.push_str("- Adoption by the requesting customers\n");
        md.push_str("- Reduction in related feedback and support requests\n");

        Self { title, markdown: md }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    /// Write the markdown to a file.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.markdown)
    }
}
