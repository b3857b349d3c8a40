//! End-to-end run: select, plan, approve, document, publish.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;

use super::console::Console;
use super::editor::{review_plan, EditorOutcome};
use super::plan::ApprovedPlan;
use super::planning::PlanGenerator;
use super::prd::PrdDocument;
use super::report::{RunReport, RunStatus, APPROVED_PLAN_FILE, PRD_FILE, RESULTS_FILE};
use super::selector::{preselect, select_feature};
use super::WorkflowError;
use crate::ai::AIManager;
use crate::core::{ArtifactKind, Config};
use crate::feedback::{load_ranked, Feature};
use crate::integrations::{
    feature_issue, today_in, CalendarClient, GitHubIssues, NotificationMessage, NotionClient,
    ReviewEvent, SlackClient,
};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Feedback analysis file to read feature requests from
    pub feedback_file: PathBuf,
    /// Directory for the run artifacts
    pub output_dir: PathBuf,
    /// Feature number to use instead of asking
    pub feature: Option<usize>,
    /// Publish without asking for confirmation
    pub auto_confirm: bool,
    /// Write local artifacts only
    pub dry_run: bool,
}

impl RunOptions {
    /// Defaults taken from the `[general]` config section.
    pub fn from_config(config: &Config) -> Self {
        Self {
            feedback_file: config.general.feedback_file.clone(),
            output_dir: config.general.output_dir.clone(),
            feature: None,
            auto_confirm: config.general.auto_confirm,
            dry_run: false,
        }
    }
}

/// Drives one workflow run against an operator console.
pub struct Pipeline<'a, R, W> {
    config: &'a Config,
    ai: &'a AIManager,
    console: Console<R, W>,
    options: RunOptions,
}

impl<'a, R: BufRead, W: Write> Pipeline<'a, R, W> {
    pub fn new(config: &'a Config, ai: &'a AIManager, console: Console<R, W>, options: RunOptions) -> Self {
        Self { config, ai, console, options }
    }

    /// Hand the console back, e.g. to inspect captured output.
    pub fn into_console(self) -> Console<R, W> {
        self.console
    }

    /// Run the workflow. The run report is written whatever the outcome;
    /// a failed run still returns its error afterwards.
    pub async fn run(&mut self) -> anyhow::Result<RunReport> {
        std::fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.options.output_dir.display())
        })?;

        let mut report = RunReport::new(self.options.dry_run);
        let results = self.options.output_dir.join(RESULTS_FILE);
        tracing::info!(run_id = %report.run_id, dry_run = self.options.dry_run, "Starting workflow");

        match self.execute(&mut report).await {
            Ok(status) => {
                report
                    .finish(status, None, &results)
                    .with_context(|| format!("Failed to write {}", results.display()))?;
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Workflow failed");
                if let Err(write_err) = report.finish(RunStatus::Failed, Some(e.to_string()), &results) {
                    tracing::error!(error = %write_err, "Could not write run report");
                }
                Err(anyhow::Error::new(e).context("Workflow failed"))
            }
        }
    }

    async fn execute(&mut self, report: &mut RunReport) -> Result<RunStatus, WorkflowError> {
        let items = load_ranked(&self.options.feedback_file)?;

        let feature = match self.options.feature {
            Some(number) => {
                let feature = preselect(&items, number)?;
                self.console.say(format!("Selected: {}", feature.title))?;
                feature
            }
            None => match select_feature(&mut self.console, &items)? {
                Some(feature) => feature,
                None => {
                    self.console.say("Workflow aborted.")?;
                    return Ok(RunStatus::Aborted);
                }
            },
        };
        report.feature = Some(feature.clone());

        let Some(plan) = self.approve_plan(&feature).await? else {
            self.console.say("Workflow aborted.")?;
            return Ok(RunStatus::Aborted);
        };
        let artifact = serde_json::json!({ "feature": &feature, "plan": &plan });
        std::fs::write(
            self.options.output_dir.join(APPROVED_PLAN_FILE),
            serde_json::to_string_pretty(&artifact)?,
        )?;
        report.plan = Some(plan.clone());

        let prd = PrdDocument::render(&feature, &plan);
        let prd_path = self.options.output_dir.join(PRD_FILE);
        prd.write(&prd_path)?;
        tracing::info!(path = %prd_path.display(), "Rendered PRD");

        self.publish_document(&feature, &prd, report).await?;
        self.publish_issue(&feature, &plan, report).await?;
        self.notify(&feature, &plan, report).await?;
        self.schedule_review(&feature, report).await?;

        self.console.say("\nWorkflow completed.")?;
        Ok(RunStatus::Completed)
    }

    /// Generate a plan and hand it to the operator until it is approved.
    async fn approve_plan(&mut self, feature: &Feature) -> Result<Option<ApprovedPlan>, WorkflowError> {
        let generator = PlanGenerator::new(self.ai, self.config.ai.max_attempts);

        loop {
            self.console.say("\nGenerating development plan...")?;
            let mut plan = generator.generate(feature).await;
            if plan.is_default() {
                self.console.say(format!("Using the default plan ({})", plan.source))?;
            }

            match review_plan(&mut self.console, &mut plan, &feature.title)? {
                EditorOutcome::Approved(approved) => return Ok(Some(approved)),
                EditorOutcome::Regenerate => tracing::info!("Regenerating plan"),
                EditorOutcome::Quit => return Ok(None),
            }
        }
    }

    /// Decide whether a configured publish step goes ahead.
    fn should_publish(&mut self, kind: ArtifactKind, report: &mut RunReport) -> Result<bool, WorkflowError> {
        if report.links.contains(kind) {
            report.skip(kind.name(), "already created in this run");
            return Ok(false);
        }
        if !self.options.auto_confirm
            && !self.console.confirm(&format!("\nCreate the {}?", kind.label()))?
        {
            report.skip(kind.name(), "declined");
            return Ok(false);
        }
        if self.options.dry_run {
            self.console.say(format!("[dry-run] Would create the {}", kind.label()))?;
            report.skip(kind.name(), "dry run");
            return Ok(false);
        }
        Ok(true)
    }

    fn record(&mut self, report: &mut RunReport, kind: ArtifactKind, url: String) -> Result<(), WorkflowError> {
        self.console.say(format!("{} created: {}", kind.label(), url))?;
        tracing::info!(kind = %kind, url = %url, "Recorded link");
        report.links.record(kind, url)?;
        Ok(())
    }

    async fn publish_document(
        &mut self,
        feature: &Feature,
        prd: &PrdDocument,
        report: &mut RunReport,
    ) -> Result<(), WorkflowError> {
        let kind = ArtifactKind::Document;
        let Some(client) = NotionClient::from_config(&self.config.notion) else {
            report.skip(kind.name(), "Notion is not configured");
            return Ok(());
        };
        if !self.should_publish(kind, report)? {
            return Ok(());
        }

        let page = client.publish_prd(prd.title(), feature.priority, prd.markdown()).await?;
        self.record(report, kind, page.url)
    }

    async fn publish_issue(
        &mut self,
        feature: &Feature,
        plan: &ApprovedPlan,
        report: &mut RunReport,
    ) -> Result<(), WorkflowError> {
        let kind = ArtifactKind::Issue;
        let Some(client) = GitHubIssues::from_config(&self.config.github) else {
            report.skip(kind.name(), "GitHub is not configured");
            return Ok(());
        };
        if !self.should_publish(kind, report)? {
            return Ok(());
        }

        let options = feature_issue(
            feature,
            &plan.descriptions(),
            report.links.get(ArtifactKind::Document),
            &self.config.github,
        );
        let issue = client.create_issue(options).await?;
        self.record(report, kind, issue.html_url)
    }

    async fn notify(
        &mut self,
        feature: &Feature,
        plan: &ApprovedPlan,
        report: &mut RunReport,
    ) -> Result<(), WorkflowError> {
        let kind = ArtifactKind::Notification;
        let (Some(client), Some(channel)) =
            (SlackClient::from_config(&self.config.slack), self.config.slack.channel.clone())
        else {
            report.skip(kind.name(), "Slack is not configured");
            return Ok(());
        };
        if !self.should_publish(kind, report)? {
            return Ok(());
        }

        let message = NotificationMessage::feature_started(feature, plan.steps().len(), &report.links);
        let permalink = client.send_notification(&channel, &message).await?;
        self.record(report, kind, permalink)
    }

    async fn schedule_review(&mut self, feature: &Feature, report: &mut RunReport) -> Result<(), WorkflowError> {
        let kind = ArtifactKind::CalendarEvent;
        let config = self.config;
        let calendar = &config.calendar;
        if calendar.access_token.is_none() && calendar.token_path.is_none() {
            report.skip(kind.name(), "Google Calendar is not configured");
            return Ok(());
        }
        // Token resolution may refresh over the network, so it waits for confirmation.
        if !self.should_publish(kind, report)? {
            return Ok(());
        }
        let Some(client) = CalendarClient::from_config(calendar).await? else {
            report.skip(kind.name(), "no calendar access token available");
            return Ok(());
        };

        let today = today_in(&calendar.time_zone, chrono::Utc::now());
        let event = ReviewEvent::for_feature(&feature.title, &report.links, calendar, today);
        let created = client.insert_event(&event).await?;
        self.record(report, kind, created.html_link)
    }
}
