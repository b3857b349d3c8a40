//! Feedback analysis report, as produced by `pmflow analyze`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sentiment::{impact_score, is_feature_request, SentimentScorer};
use super::{rank_features, FeedbackItem, Sentiment};
use crate::integrations::{SlackClient, SlackError};

/// Count of items per sentiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentDistribution {
    fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    /// Positive when positives outnumber negatives, negative for the
    /// reverse, neutral otherwise.
    pub fn overall(&self) -> Sentiment {
        match self.positive.cmp(&self.negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Result of analyzing a batch of feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub total_feedback: usize,
    pub sentiment_distribution: SentimentDistribution,
    pub overall_sentiment: Sentiment,
    pub average_sentiment_score: f64,
    /// Which scorer produced the sentiments
    pub scorer: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub feedback_items: Vec<FeedbackItem>,
    /// Feature requests ranked by impact, highest first
    pub feature_requests: Vec<FeedbackItem>,
}

impl FeedbackAnalysis {
    /// Write the report as pretty JSON.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "Wrote feedback analysis");
        Ok(())
    }
}

/// Score every item and build the analysis report.
///
/// Existing sentiment labels are replaced; explicit priorities are kept.
pub async fn analyze(items: Vec<FeedbackItem>, scorer: &dyn SentimentScorer) -> FeedbackAnalysis {
    let mut distribution = SentimentDistribution::default();
    let mut polarity_sum = 0.0;
    let mut scored = Vec::with_capacity(items.len());

    for mut item in items {
        let score = scorer.score(&item.text).await;
        item.sentiment = Some(score.sentiment);
        item.sentiment_score = Some(score.polarity);
        item.impact_score = Some(impact_score(score.sentiment, &item.text));

        distribution.add(score.sentiment);
        polarity_sum += score.polarity;
        scored.push(item);
    }

    let total = scored.len();
    let average = if total == 0 { 0.0 } else { polarity_sum / total as f64 };

    let feature_requests = rank_features(
        scored.iter().filter(|item| is_feature_request(&item.text)).cloned().collect(),
    );

    tracing::info!(
        total,
        features = feature_requests.len(),
        scorer = scorer.name(),
        "Analyzed feedback"
    );

    FeedbackAnalysis {
        total_feedback: total,
        sentiment_distribution: distribution,
        overall_sentiment: distribution.overall(),
        average_sentiment_score: (average * 1000.0).round() / 1000.0,
        scorer: scorer.name().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        feedback_items: scored,
        feature_requests,
    }
}

/// Pull user messages from a Slack channel as feedback items.
///
/// Messages without an author or text (joins, bot posts) are skipped.
pub async fn gather_slack_feedback(
    client: &SlackClient,
    channel: &str,
    limit: u32,
) -> Result<Vec<FeedbackItem>, SlackError> {
    let channel_id = client.resolve_channel(channel).await?;
    let messages = client.channel_history(&channel_id, limit).await?;
    let channel_name = channel.trim().trim_start_matches('#').to_string();

    let items: Vec<FeedbackItem> = messages
        .into_iter()
        .filter(|m| m.subtype.is_none())
        .filter_map(|m| {
            let user = m.user?;
            let text = m.text.filter(|t| !t.trim().is_empty())?;
            let mut item = FeedbackItem::new(text, "slack").with_user(user);
            item.channel = Some(channel_name.clone());
            item.timestamp = m.ts;
            Some(item)
        })
        .collect();

    tracing::info!(channel = %channel_name, count = items.len(), "Gathered Slack feedback");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::KeywordScorer;

    fn sample() -> Vec<FeedbackItem> {
        vec![
            FeedbackItem::new("I love the new dashboard, great work", "email"),
            FeedbackItem::new("The app keeps crashing, terrible experience", "slack"),
            FeedbackItem::new("We need an Excel export feature", "slack"),
            FeedbackItem::new("Please add dark mode, it would be awesome", "review_site"),
        ]
    }

    #[tokio::test]
    async fn test_analyze_counts_and_ranks() {
        let report = analyze(sample(), &KeywordScorer).await;

        assert_eq!(report.total_feedback, 4);
        assert_eq!(
            report.sentiment_distribution,
            SentimentDistribution { positive: 2, negative: 1, neutral: 1 }
        );
        assert_eq!(report.overall_sentiment, Sentiment::Positive);
        assert_eq!(report.average_sentiment_score, 0.25);
        assert_eq!(report.scorer, "keyword");

        assert_eq!(report.feature_requests.len(), 2);
        assert!(report
            .feature_requests
            .windows(2)
            .all(|w| w[0].impact() >= w[1].impact()));
        assert!(report.feedback_items.iter().all(|i| i.impact_score.is_some()));
    }

    #[tokio::test]
    async fn test_analyze_empty() {
        let report = analyze(Vec::new(), &KeywordScorer).await;
        assert_eq!(report.total_feedback, 0);
        assert_eq!(report.overall_sentiment, Sentiment::Neutral);
        assert_eq!(report.average_sentiment_score, 0.0);
        assert!(report.feature_requests.is_empty());
    }

    #[tokio::test]
    async fn test_report_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/feedback_analysis.json");

        let report = analyze(sample(), &KeywordScorer).await;
        report.write(&path).unwrap();

        let loaded = crate::feedback::load_feature_requests(&path).unwrap();
        assert_eq!(loaded.len(), report.feature_requests.len());
        assert_eq!(loaded[0].text, report.feature_requests[0].text);
    }

    #[test]
    fn test_overall_tie_is_neutral() {
        let d = SentimentDistribution { positive: 2, negative: 2, neutral: 0 };
        assert_eq!(d.overall(), Sentiment::Neutral);
    }
}
