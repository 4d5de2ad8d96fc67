//! Completion API Contract Tests
//!
//! Verify the HTTP shape of completion requests and how responses and error
//! statuses map onto `MeetingError`, against a mock OpenAI-compatible server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use stakeholder_voice::config::LlmConfig;
use stakeholder_voice::llm::{
    ChatTurn, CompletionClient, CompletionRequest, OpenAiCompletionClient, ResponseGenerator,
    Sampling,
};
use stakeholder_voice::{MeetingError, Message, Project, Scenario};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest {
        system_prompt: "You are Marie Dubois.".into(),
        turns: vec![ChatTurn::user(text)],
        sampling: Sampling::default(),
    }
}

fn client(server: &MockServer) -> OpenAiCompletionClient {
    OpenAiCompletionClient::new("test-key", "gpt-4o-mini").with_base_url(server.uri())
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_carries_auth_model_and_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are Marie Dubois."},
                {"role": "user", "content": "What does the audit need?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Evidence, mostly.")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .complete(&request("What does the audit need?"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "Evidence, mostly.");
}

#[tokio::test]
async fn test_generator_sends_persona_prompt_for_named_stakeholder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Signed checklists.")))
        .expect(1)
        .mount(&server)
        .await;

    let config = LlmConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        ..LlmConfig::default()
    };
    let generator = ResponseGenerator::from_config(&config).unwrap();
    let scenario = Scenario::builtin().unwrap();

    let reply = generator
        .generate_response(
            &scenario.project,
            &scenario.stakeholders,
            &[],
            "Marie, what does the audit need?",
            &mut StdRng::seed_from_u64(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(reply.speaker.stakeholder_id(), Some("marie-dubois"));
    assert_eq!(reply.content, "Signed checklists.");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = received[0].body_json().unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("Marie Dubois"));
    assert!(system.contains("Compliance Officer"));
}

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

async fn error_for(status: u16, body: serde_json::Value) -> MeetingError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    client(&server)
        .complete(&request("Hello"), &CancellationToken::new())
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_status_codes_map_to_variants() {
    let body = json!({"error": {"message": "Incorrect API key provided"}});
    let err = error_for(401, body.clone()).await;
    assert!(matches!(err, MeetingError::Auth(_)));
    assert!(err.message().contains("Incorrect API key provided"));

    assert!(matches!(error_for(403, body.clone()).await, MeetingError::Forbidden(_)));

    let err = error_for(429, body.clone()).await;
    assert!(matches!(err, MeetingError::RateLimited(_)));
    assert!(err.is_retryable());

    let err = error_for(500, body).await;
    assert!(matches!(err, MeetingError::Request { status: 500, .. }));
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_empty_choice_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&request("Hello"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::EmptyCompletion(_)));
}

// ────────────────────────────────────────────────────────────────────────────
// Fail-fast and cancellation
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("never")))
        .expect(0)
        .mount(&server)
        .await;

    let config = LlmConfig {
        api_key: None,
        base_url: server.uri(),
        ..LlmConfig::default()
    };
    let generator = ResponseGenerator::from_config(&config).unwrap();
    assert!(!generator.is_configured());

    let scenario = Scenario::builtin().unwrap();
    let err = generator
        .generate_response(
            &Project::default(),
            &scenario.stakeholders,
            &[Message::user("Hi")],
            "Hello?",
            &mut StdRng::seed_from_u64(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn test_cancelled_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("never")))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client(&server)
        .complete(&request("Hello"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::Cancelled(_)));
}

#[tokio::test]
async fn test_cancellation_interrupts_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(std::time::Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client(&server)
        .complete(&request("Hello"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::Cancelled(_)));
}

#[tokio::test]
async fn test_timeout_maps_to_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = LlmConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        timeout_secs: Some(1),
        ..LlmConfig::default()
    };
    let err = OpenAiCompletionClient::from_config(&config)
        .unwrap()
        .complete(&request("Hello"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::Transport(_)));
}
