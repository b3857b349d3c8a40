//! Vendor API clients against mock servers.

use std::time::Duration;

use pmflow::ai::{AIManager, AIProvider, GeminiProvider};
use pmflow::core::{ArtifactKind, CalendarConfig, ExternalLinks, RetryConfig};
use pmflow::feedback::{gather_slack_feedback, Feature, Priority, Sentiment};
use pmflow::integrations::{
    feature_issue, CalendarClient, GitHubIssues, IssueState, IssuesError, ListIssuesOptions,
    NotificationMessage, NotionClient, NotionError, ReviewEvent, SlackClient, SlackError,
};
use pmflow::workflow::{PlanGenerator, PlanSource};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feature() -> Feature {
    Feature {
        title: "Export reports to Excel".to_string(),
        description: "We need an export to Excel option for the reports".to_string(),
        impact_score: 0.8,
        priority: Priority::High,
        sentiment: Sentiment::Negative,
        source: "slack".to_string(),
        user: "U42".to_string(),
    }
}

// ============================================================================
// Slack
// ============================================================================

#[tokio::test]
async fn test_slack_notification_resolves_channel_across_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "C0PRODUCT01", "name": "product"}],
            "response_metadata": {"next_cursor": ""}
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "C0GENERAL01", "name": "general"}],
            "response_metadata": {"next_cursor": "page2"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_partial_json(json!({"channel": "C0PRODUCT01"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true, "channel": "C0PRODUCT01", "ts": "1724511111.000100"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chat.getPermalink"))
        .and(query_param("message_ts", "1724511111.000100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "permalink": "https://acme.slack.com/archives/C0PRODUCT01/p1724511111000100"
        })))
        .mount(&server)
        .await;

    let client = SlackClient::new("xoxb-test").with_base_url(server.uri());
    let message = NotificationMessage::feature_started(&feature(), 4, &ExternalLinks::new());
    let permalink = client.send_notification("#product", &message).await.unwrap();

    assert_eq!(permalink, "https://acme.slack.com/archives/C0PRODUCT01/p1724511111000100");
}

#[tokio::test]
async fn test_slack_not_in_channel_names_the_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_in_channel"})),
        )
        .mount(&server)
        .await;

    let client = SlackClient::new("xoxb-test").with_base_url(server.uri());
    let err = client
        .send_notification("C0PRODUCT01", &NotificationMessage::text("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SlackError::NotInChannel(ref c) if c == "C0PRODUCT01"));
    assert!(err.to_string().contains("/invite"));
}

#[tokio::test]
async fn test_slack_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.history"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let client = SlackClient::new("xoxb-test").with_base_url(server.uri());
    let err = client.channel_history("C0PRODUCT01", 10).await.unwrap_err();
    assert!(matches!(err, SlackError::RateLimited { retry_after: Some(30) }));
}

#[tokio::test]
async fn test_gather_slack_feedback_skips_system_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.history"))
        .and(query_param("channel", "C0FEEDBACK1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [
                {"user": "U1", "text": "Please add SSO", "ts": "1.1"},
                {"user": "U2", "text": "joined", "ts": "1.2", "subtype": "channel_join"},
                {"text": "bot post without user", "ts": "1.3"},
                {"user": "U3", "text": "  ", "ts": "1.4"}
            ]
        })))
        .mount(&server)
        .await;

    let client = SlackClient::new("xoxb-test").with_base_url(server.uri());
    let items = gather_slack_feedback(&client, "C0FEEDBACK1", 50).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].user, "U1");
    assert_eq!(items[0].timestamp.as_deref(), Some("1.1"));
}

// ============================================================================
// Notion
// ============================================================================

#[tokio::test]
async fn test_notion_publish_prd() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases/db123"))
        .and(header("notion-version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "Document": {"type": "title"},
                "Status": {"type": "status", "status": {"options": [{"name": "Draft"}, {"name": "Done"}]}},
                "Priority": {"type": "select", "select": {"options": [{"name": "High"}, {"name": "Low"}]}}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(body_partial_json(json!({
            "parent": {"database_id": "db123"},
            "properties": {
                "Status": {"status": {"name": "Draft"}},
                "Priority": {"select": {"name": "High"}}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "page-1", "url": "https://www.notion.so/page-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/blocks/page-1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = NotionClient::new("secret_test", "db123").with_base_url(server.uri());
    let page = client
        .publish_prd("PRD: Export reports to Excel", Priority::High, "# PRD\n\n- one\n- two\n")
        .await
        .unwrap();

    assert_eq!(page.url, "https://www.notion.so/page-1");
}

#[tokio::test]
async fn test_notion_unshared_database() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/db123"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error", "code": "object_not_found", "message": "Could not find database"
        })))
        .mount(&server)
        .await;

    let client = NotionClient::new("secret_test", "db123").with_base_url(server.uri());
    let err = client.retrieve_database().await.unwrap_err();
    assert!(matches!(err, NotionError::NotFound(ref m) if m.contains("Could not find")));
}

// ============================================================================
// GitHub
// ============================================================================

fn issue_json(state: &str) -> serde_json::Value {
    json!({
        "number": 7,
        "title": "Feature: Export reports to Excel",
        "body": "Generated from feedback",
        "state": state,
        "labels": [{"name": "enhancement"}],
        "html_url": "https://github.com/acme/app/issues/7",
        "created_at": "2026-10-12T09:30:00Z"
    })
}

async fn mount_current_issue(server: &MockServer, state: &str) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/issues/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(state)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_github_create_feature_issue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/app/issues"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(body_partial_json(json!({
            "title": "Feature: Export reports to Excel",
            "labels": ["enhancement", "feature-request", "priority: high"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json("open")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let options = feature_issue(
        &feature(),
        &["Research".to_string(), "Build".to_string()],
        None,
        &Default::default(),
    );
    let issue = client.create_issue(options).await.unwrap();

    let mut links = ExternalLinks::new();
    links.record(ArtifactKind::Issue, issue.html_url).unwrap();
    assert_eq!(links.get(ArtifactKind::Issue), Some("https://github.com/acme/app/issues/7"));
}

#[tokio::test]
async fn test_github_close_with_comment() {
    let server = MockServer::start().await;
    mount_current_issue(&server, "open").await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/app/issues/7/comments"))
        .and(body_partial_json(json!({"body": "Shipped in 2.4"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "body": "Shipped in 2.4"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/app/issues/7"))
        .and(body_partial_json(json!({"state": "closed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json("closed")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let issue = client.set_state(7, IssueState::Closed, Some("Shipped in 2.4")).await.unwrap();
    assert_eq!(issue.state, "closed");
}

#[tokio::test]
async fn test_github_reopen_prefixes_comment() {
    let server = MockServer::start().await;
    mount_current_issue(&server, "closed").await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/app/issues/7/comments"))
        .and(body_partial_json(json!({"body": "Reopened: Regression in 2.5"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2, "body": "Reopened: Regression in 2.5"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/app/issues/7"))
        .and(body_partial_json(json!({"state": "open"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json("open")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let issue = client.set_state(7, IssueState::Open, Some("Regression in 2.5")).await.unwrap();
    assert_eq!(issue.state, "open");
}

#[tokio::test]
async fn test_github_set_state_when_already_closed() {
    let server = MockServer::start().await;
    mount_current_issue(&server, "closed").await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/app/issues/7/comments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/app/issues/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let issue = client.set_state(7, IssueState::Closed, Some("Shipped")).await.unwrap();
    assert_eq!(issue.state, "closed");
}

#[tokio::test]
async fn test_github_list_open_feature_requests() {
    let server = MockServer::start().await;
    let mut pull = issue_json("open");
    pull["number"] = json!(8);
    pull["pull_request"] = json!({"url": "https://api.github.com/repos/acme/app/pulls/8"});
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/issues"))
        .and(query_param("state", "open"))
        .and(query_param("labels", "feature-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([issue_json("open"), pull])))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let issues = client.list_issues(ListIssuesOptions::default()).await.unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 7);
    assert_eq!(issues[0].created_at.as_deref(), Some("2026-10-12T09:30:00Z"));
    assert_eq!(issues[0].label_names(), "enhancement");
}

#[tokio::test]
async fn test_github_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/app/issues/7"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
        .mount(&server)
        .await;

    let client = GitHubIssues::new("ghp_test", "acme", "app").with_base_url(server.uri());
    let err = client.set_state(7, IssueState::Closed, None).await.unwrap_err();
    assert!(matches!(err, IssuesError::RateLimited));
}

// ============================================================================
// Google Calendar
// ============================================================================

#[tokio::test]
async fn test_calendar_insert_review_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/team%40example.com/events"))
        .and(query_param("sendUpdates", "all"))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({
            "summary": "Review: Export reports to Excel",
            "start": {"dateTime": "2026-10-26T10:00:00", "timeZone": "Europe/Berlin"},
            "attendees": [{"email": "pm@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt1", "htmlLink": "https://calendar.google.com/event?eid=evt1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CalendarConfig {
        calendar_id: "team@example.com".to_string(),
        time_zone: "Europe/Berlin".to_string(),
        attendees: vec!["pm@example.com".to_string()],
        access_token: Some("ya29.test".to_string()),
        base_url: server.uri(),
        ..Default::default()
    };
    let client = CalendarClient::from_config(&config).await.unwrap().unwrap();

    let today = chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let event = ReviewEvent::for_feature("Export reports to Excel", &ExternalLinks::new(), &config, today);
    let created = client.insert_event(&event).await.unwrap();

    assert_eq!(created.html_link, "https://calendar.google.com/event?eid=evt1");
}

#[tokio::test]
async fn test_calendar_refreshes_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh", "expires_in": 3600, "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(header("authorization", "Bearer ya29.fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt2", "htmlLink": "https://calendar.google.com/event?eid=evt2"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(
        &token_path,
        json!({
            "token": "ya29.stale",
            "refresh_token": "1//refresh",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "shh",
            "expiry": "2020-01-01T00:00:00Z"
        })
        .to_string(),
    )
    .unwrap();

    let config = CalendarConfig {
        token_path: Some(token_path.clone()),
        base_url: server.uri(),
        token_url: format!("{}/token", server.uri()),
        ..Default::default()
    };
    let client = CalendarClient::from_config(&config).await.unwrap().unwrap();
    let event = ReviewEvent::for_feature(
        "Export reports to Excel",
        &ExternalLinks::new(),
        &config,
        chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    );
    client.insert_event(&event).await.unwrap();

    let saved = std::fs::read_to_string(&token_path).unwrap();
    assert!(saved.contains("ya29.fresh"));
    assert!(saved.contains("1//refresh"));
}

// ============================================================================
// Planning with Gemini
// ============================================================================

#[tokio::test]
async fn test_plan_from_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{
                "text": "```json\n[\"Research export formats\", \"Build the exporter\", \"Ship behind a flag\"]\n```"
            }]}}]
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri()).with_model("gemini-test");
    let providers: Vec<Box<dyn AIProvider>> = vec![Box::new(provider)];
    let ai = AIManager::with_providers(providers);
    let plan = PlanGenerator::new(&ai, 1).generate(&feature()).await;

    assert_eq!(plan.source, PlanSource::Generated { provider: "gemini".to_string() });
    let steps: Vec<&str> = plan.steps().iter().map(|s| s.description.as_str()).collect();
    assert_eq!(steps, vec!["Research export formats", "Build the exporter", "Ship behind a flag"]);
}

#[tokio::test]
async fn test_plan_falls_back_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(2)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new("test-key").with_base_url(server.uri()).with_model("gemini-test");
    let providers: Vec<Box<dyn AIProvider>> = vec![Box::new(provider)];
    let ai = AIManager::with_providers(providers);
    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        backoff_multiplier: 1.0,
    };
    let plan = PlanGenerator::new(&ai, 2).with_retry(retry).generate(&feature()).await;

    assert!(plan.is_default());
    assert_eq!(plan.source.to_string(), "default plan (planning failed after 2 attempts)");
}
