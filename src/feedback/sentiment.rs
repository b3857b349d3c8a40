//! Sentiment scoring and impact heuristics.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Sentiment;
use crate::ai::AIManager;

const POSITIVE_WORDS: &[&str] = &[
    "great",
    "awesome",
    "love",
    "amazing",
    "excellent",
    "good",
    "perfect",
    "wonderful",
    "impressive",
    "fantastic",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "hate",
    "disappointing",
    "poor",
    "crash",
    "bug",
    "issue",
    "problem",
    "frustrating",
    "broken",
];

const FEATURE_KEYWORDS: &[&str] =
    &["feature", "request", "add", "implement", "support", "would like", "want", "need"];

/// Score produced by a [`SentimentScorer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    /// Label
    pub sentiment: Sentiment,
    /// Polarity in [-1, 1]
    pub polarity: f64,
}

impl SentimentScore {
    /// Neutral score with zero polarity.
    pub const NEUTRAL: Self = Self { sentiment: Sentiment::Neutral, polarity: 0.0 };
}

/// Something that can score the sentiment of a text.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Score a text. Scorers never fail; they degrade to a neutral score.
    async fn score(&self, text: &str) -> SentimentScore;

    /// Scorer name for logs and reports.
    fn name(&self) -> &str;
}

/// Keyword-counting sentiment heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    /// Classify synchronously.
    pub fn classify(&self, text: &str) -> SentimentScore {
        let lower = text.to_lowercase();
        let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => {
                SentimentScore { sentiment: Sentiment::Positive, polarity: 1.0 }
            }
            std::cmp::Ordering::Less => {
                SentimentScore { sentiment: Sentiment::Negative, polarity: -1.0 }
            }
            std::cmp::Ordering::Equal => SentimentScore::NEUTRAL,
        }
    }
}

#[async_trait]
impl SentimentScorer for KeywordScorer {
    async fn score(&self, text: &str) -> SentimentScore {
        self.classify(text)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number pattern"));

const SENTIMENT_SYSTEM: &str = "You are a sentiment analysis service. \
Rate the sentiment of the customer feedback you are given as a polarity between -1.0 \
(very negative) and 1.0 (very positive). Reply with the number only.";

/// Sentiment scorer backed by the AI provider chain.
///
/// Falls back to [`KeywordScorer`] when the provider fails or replies with
/// something that is not a number.
pub struct AiSentimentScorer {
    manager: AIManager,
    fallback: KeywordScorer,
}

impl AiSentimentScorer {
    /// Create a scorer using the given provider chain.
    pub fn new(manager: AIManager) -> Self {
        Self { manager, fallback: KeywordScorer }
    }
}

#[async_trait]
impl SentimentScorer for AiSentimentScorer {
    async fn score(&self, text: &str) -> SentimentScore {
        if text.trim().is_empty() {
            return SentimentScore::NEUTRAL;
        }

        match self.manager.complete(SENTIMENT_SYSTEM, text).await {
            Ok(completion) => match parse_polarity(&completion.text) {
                Some(polarity) => {
                    SentimentScore { sentiment: Sentiment::from_polarity(polarity), polarity }
                }
                None => {
                    tracing::warn!(reply = %completion.text, "Unparseable sentiment reply, using keywords");
                    self.fallback.classify(text)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Sentiment provider failed, using keywords");
                self.fallback.classify(text)
            }
        }
    }

    fn name(&self) -> &str {
        "ai"
    }
}

/// Pull the first number out of a model reply and clamp it to [-1, 1].
pub fn parse_polarity(reply: &str) -> Option<f64> {
    NUMBER
        .find(reply)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|v| v.clamp(-1.0, 1.0))
}

/// Impact score from sentiment and text length.
///
/// Negative feedback weighs most; longer feedback adds up to 0.3.
pub fn impact_score(sentiment: Sentiment, text: &str) -> f64 {
    let weight = match sentiment {
        Sentiment::Positive => 0.3,
        Sentiment::Negative => 0.7,
        Sentiment::Neutral => 0.1,
    };
    let length = (text.chars().count() as f64 / 100.0).min(1.0);
    weight * 0.7 + length * 0.3
}

/// Whether feedback reads like a feature request.
pub fn is_feature_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    FEATURE_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AIProvider;

    struct Reply(&'static str);

    #[async_trait]
    impl AIProvider for Reply {
        async fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "reply"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn scorer_replying(reply: &'static str) -> AiSentimentScorer {
        let providers: Vec<Box<dyn AIProvider>> = vec![Box::new(Reply(reply))];
        AiSentimentScorer::new(AIManager::with_providers(providers))
    }

    #[test]
    fn test_keyword_classification() {
        let scorer = KeywordScorer;
        assert_eq!(scorer.classify("I love this, amazing work").sentiment, Sentiment::Positive);
        assert_eq!(scorer.classify("App crash on login, terrible").sentiment, Sentiment::Negative);
        assert_eq!(scorer.classify("Add an export button").sentiment, Sentiment::Neutral);
        // One of each cancels out
        assert_eq!(scorer.classify("good idea but buggy").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_keyword_polarity() {
        let scorer = KeywordScorer;
        assert!((scorer.classify("great").polarity - 1.0).abs() < f64::EPSILON);
        assert!((scorer.classify("broken").polarity + 1.0).abs() < f64::EPSILON);
        assert!(scorer.classify("").polarity.abs() < f64::EPSILON);
    }

    #[test]
    fn test_impact_score() {
        let short_negative = impact_score(Sentiment::Negative, "bug");
        assert!((short_negative - (0.49 + 0.009)).abs() < 1e-9);

        let long_text = "x".repeat(250);
        let long_neutral = impact_score(Sentiment::Neutral, &long_text);
        assert!((long_neutral - (0.07 + 0.3)).abs() < 1e-9);

        assert!(impact_score(Sentiment::Negative, "same") > impact_score(Sentiment::Positive, "same"));
    }

    #[test]
    fn test_is_feature_request() {
        assert!(is_feature_request("We need better CRM integration."));
        assert!(is_feature_request("Would like a dark mode"));
        assert!(is_feature_request("Please SUPPORT SAML"));
        assert!(!is_feature_request("Thanks for the quick reply"));
        assert!(!is_feature_request("Great product!"));
    }

    #[test]
    fn test_parse_polarity() {
        assert_eq!(parse_polarity("0.8"), Some(0.8));
        assert_eq!(parse_polarity("Polarity: -0.35"), Some(-0.35));
        assert_eq!(parse_polarity("7"), Some(1.0));
        assert_eq!(parse_polarity("unsure"), None);
    }

    #[tokio::test]
    async fn test_ai_scorer_falls_back_without_provider() {
        let scorer = AiSentimentScorer::new(AIManager::none());
        let score = scorer.score("this is terrible").await;
        assert_eq!(score.sentiment, Sentiment::Negative);
        assert_eq!(scorer.score("   ").await, SentimentScore::NEUTRAL);
    }

    #[tokio::test]
    async fn test_ai_scorer_uses_provider_polarity() {
        // Keywords alone would call this positive.
        let score = scorer_replying("-0.4").score("I love the idea but it never loads").await;
        assert_eq!(score.sentiment, Sentiment::Negative);
        assert!((score.polarity + 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ai_scorer_unparseable_reply_uses_keywords() {
        let score = scorer_replying("It depends.").score("amazing, love it").await;
        assert_eq!(score.sentiment, Sentiment::Positive);
    }
}
