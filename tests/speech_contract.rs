//! Speech Synthesis Contract Tests
//!
//! Verify synthesis requests (headers, SSML body), status mapping, empty
//! bodies, and that the shared cache keeps repeated requests off the wire.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use stakeholder_voice::analysis::ConversationContext;
use stakeholder_voice::config::SpeechConfig;
use stakeholder_voice::tts::{
    AudioCache, AzureSpeechClient, SpeechSynthesizer, UnsupportedSpeech,
};
use stakeholder_voice::{
    EnhancementOptions, MeetingConfig, MeetingError, PersonalityEngine, PersonalizedSpeechService,
    ProfileRegistry, Scenario, SpeechService,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUDIO: &[u8] = b"ID3\x03\x00fake-mp3-frames";

fn config_for(server: &MockServer) -> MeetingConfig {
    let mut config = MeetingConfig::default();
    config.speech = SpeechConfig {
        subscription_key: Some("speech-key".into()),
        region: Some("westeurope".into()),
        endpoint: Some(format!("{}/cognitiveservices/v1", server.uri())),
        ..SpeechConfig::default()
    };
    config
}

fn service(config: &MeetingConfig) -> SpeechService {
    let synth: Arc<dyn SpeechSynthesizer> =
        Arc::new(AzureSpeechClient::from_config(&config.speech).unwrap());
    SpeechService::new(
        Some(synth),
        Arc::new(UnsupportedSpeech),
        Arc::new(AudioCache::new()),
        config,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_carries_headers_and_ssml() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .and(header("Ocp-Apim-Subscription-Key", "speech-key"))
        .and(header("X-Microsoft-OutputFormat", "audio-24khz-48kbitrate-mono-mp3"))
        .and(header("content-type", "application/ssml+xml"))
        .and(body_string_contains(r#"<voice name="en-GB-RyanNeural">"#))
        .and(body_string_contains("Pallets &amp; people"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .expect(1)
        .mount(&server)
        .await;

    let audio = service(&config_for(&server))
        .synthesize_speech(
            "Pallets & people",
            Some("en-GB-RyanNeural"),
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(&audio[..], AUDIO);
}

// ────────────────────────────────────────────────────────────────────────────
// Caching
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_hit_avoids_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .expect(1)
        .mount(&server)
        .await;

    let svc = service(&config_for(&server));
    let cancel = CancellationToken::new();
    let first = svc
        .synthesize_speech("Good morning", Some("en-US-AriaNeural"), true, &cancel)
        .await
        .unwrap();
    let second = svc
        .synthesize_speech("Good morning", Some("en-US-AriaNeural"), true, &cancel)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(svc.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_cache_disabled_by_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.speech.cache_enabled = false;
    let svc = service(&config);
    let cancel = CancellationToken::new();
    svc.synthesize_speech("Hi", None, true, &cancel).await.unwrap();
    svc.synthesize_speech("Hi", None, true, &cancel).await.unwrap();
    assert!(svc.cache().is_empty());
}

#[tokio::test]
async fn test_personalized_path_shares_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<prosody"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let speech = Arc::new(service(&config));
    let engine = Arc::new(PersonalityEngine::from_config(
        Arc::new(ProfileRegistry::builtin().unwrap()),
        &config,
    ));
    let personalized = PersonalizedSpeechService::new(speech.clone(), engine);
    let marie = Scenario::builtin()
        .unwrap()
        .stakeholders
        .into_iter()
        .find(|s| s.id == "marie-dubois")
        .unwrap();
    let ctx = ConversationContext::default();
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let out = personalized
            .synthesize(
                "Retention is seven years.",
                &marie,
                &ctx,
                &EnhancementOptions::default(),
                &mut StdRng::seed_from_u64(11),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(&out.audio[..], AUDIO);
    }
    assert_eq!(speech.cache().len(), 1);
}

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

async fn error_for(template: ResponseTemplate) -> MeetingError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(template)
        .mount(&server)
        .await;
    service(&config_for(&server))
        .synthesize_speech("Hello", None, true, &CancellationToken::new())
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_status_codes_map_to_variants() {
    assert!(matches!(
        error_for(ResponseTemplate::new(401)).await,
        MeetingError::Auth(_)
    ));
    assert!(matches!(
        error_for(ResponseTemplate::new(403)).await,
        MeetingError::Forbidden(_)
    ));
    assert!(matches!(
        error_for(ResponseTemplate::new(429)).await,
        MeetingError::RateLimited(_)
    ));
    let err = error_for(ResponseTemplate::new(502).set_body_string("bad gateway")).await;
    assert!(matches!(err, MeetingError::Request { status: 502, .. }));
    assert!(err.to_string().contains("bad gateway"));
}

#[tokio::test]
async fn test_empty_body_is_a_failure() {
    let err = error_for(ResponseTemplate::new(200)).await;
    assert!(matches!(err, MeetingError::EmptyAudio(_)));
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let svc = service(&config_for(&server));
    let cancel = CancellationToken::new();
    assert!(svc.synthesize_speech("Hi", None, true, &cancel).await.is_err());
    assert!(svc.synthesize_speech("Hi", None, true, &cancel).await.is_err());
    assert!(svc.cache().is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Fail-fast
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_credentials_fail_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = MeetingConfig::default();
    config.speech.endpoint = Some(server.uri());
    let svc = SpeechService::from_config(&config).unwrap();
    assert!(!svc.is_configured());

    let err = svc
        .synthesize_speech("Hello", None, true, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_config());
}
