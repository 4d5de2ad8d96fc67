//! End-to-end meeting turn: learner greeting → speaker selection → reply →
//! personalised SSML → synthesized audio → playback.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use stakeholder_voice::audio::{PlaybackState, SilentEngine};
use stakeholder_voice::tts::{AudioCache, LocalSpeech, LocalVoiceParams};
use stakeholder_voice::{
    Meeting, MeetingConfig, PersonalityEngine, PersonalizedSpeechService, ProfileRegistry,
    Result, Scenario, SpeechOutput, SpeechService,
};
use stakeholder_voice::llm::ResponseGenerator;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPLY: &str = "Hi! Good to have you here. The dock team is keen to see this working.";

async fn completion_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": REPLY}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn james_and_marie() -> Scenario {
    let mut scenario = Scenario::builtin().unwrap();
    scenario
        .stakeholders
        .retain(|s| s.id == "james-walker" || s.id == "marie-dubois");
    assert_eq!(scenario.stakeholders[0].id, "james-walker");
    scenario
}

#[tokio::test]
async fn greeting_is_answered_and_voiced_by_james() {
    let server = completion_server().await;
    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x49u8; 4_800]))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = MeetingConfig::default();
    config.seed = Some(42);
    config.llm.api_key = Some("test-key".into());
    config.llm.base_url = server.uri();
    config.speech.subscription_key = Some("speech-key".into());
    config.speech.endpoint = Some(format!("{}/cognitiveservices/v1", server.uri()));

    let registry = Arc::new(ProfileRegistry::builtin().unwrap());
    let mut meeting = Meeting::from_config(&config, james_and_marie(), registry, SilentEngine).unwrap();
    let cancel = CancellationToken::new();

    let reply = meeting.submit("Hi everyone", &cancel).await.unwrap();
    assert_eq!(reply.speaker.stakeholder_id(), Some("james-walker"));
    assert_eq!(reply.stakeholder_name.as_deref(), Some("James Walker"));
    assert_eq!(reply.content, REPLY);

    let output = meeting.voice_message(&reply.id, &cancel).await.unwrap();
    let SpeechOutput::Audio(audio) = output else {
        panic!("expected synthesized audio");
    };
    assert!(!audio.is_empty());
    assert_eq!(meeting.playback().state_of(&reply.id), PlaybackState::Playing);

    let requests = server.received_requests().await.unwrap();
    let ssml = requests
        .iter()
        .find(|r| r.url.path() == "/cognitiveservices/v1")
        .map(|r| String::from_utf8(r.body.clone()).unwrap())
        .unwrap();
    assert!(ssml.contains("<break"), "{ssml}");
    assert!(ssml.contains("<prosody"), "{ssml}");
    assert!(ssml.contains("en-GB-RyanNeural"));

    meeting.playback_mut().stop();
    assert_eq!(meeting.playback().state(), PlaybackState::Idle);
}

#[derive(Default)]
struct RecordingLocal {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl LocalSpeech for RecordingLocal {
    fn name(&self) -> &str {
        "recording"
    }

    async fn speak(&self, text: &str, _: &LocalVoiceParams, _: &CancellationToken) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

#[tokio::test]
async fn without_speech_credentials_the_local_fallback_speaks() {
    let server = completion_server().await;

    let mut config = MeetingConfig::default();
    config.llm.api_key = Some("test-key".into());
    config.llm.base_url = server.uri();

    let local = Arc::new(RecordingLocal::default());
    let speech = Arc::new(SpeechService::new(
        None,
        local.clone(),
        Arc::new(AudioCache::new()),
        &config,
    ));
    let personality = Arc::new(PersonalityEngine::from_config(
        Arc::new(ProfileRegistry::builtin().unwrap()),
        &config,
    ));
    let mut meeting = Meeting::new(
        james_and_marie(),
        ResponseGenerator::from_config(&config.llm).unwrap(),
        PersonalizedSpeechService::new(speech, personality),
        SilentEngine,
    )
    .unwrap()
    .with_seed(7);
    let cancel = CancellationToken::new();

    let reply = meeting.submit("Hi everyone", &cancel).await.unwrap();
    assert_eq!(reply.speaker.stakeholder_id(), Some("james-walker"));

    let output = meeting.voice_message(&reply.id, &cancel).await.unwrap();
    assert_eq!(output, SpeechOutput::Spoken);
    assert_eq!(*local.spoken.lock().unwrap(), vec![REPLY.to_owned()]);
    assert_eq!(meeting.playback().state(), PlaybackState::Idle);
    assert!(meeting.last_error().is_none());
}

#[tokio::test]
async fn synthesis_failure_is_recorded_against_the_message() {
    let server = completion_server().await;
    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut config = MeetingConfig::default();
    config.llm.api_key = Some("test-key".into());
    config.llm.base_url = server.uri();
    config.speech.subscription_key = Some("speech-key".into());
    config.speech.endpoint = Some(format!("{}/cognitiveservices/v1", server.uri()));
    config.speech.fallback_on_error = false;

    let registry = Arc::new(ProfileRegistry::builtin().unwrap());
    let mut meeting = Meeting::from_config(&config, james_and_marie(), registry, SilentEngine).unwrap();
    let cancel = CancellationToken::new();

    let reply = meeting.submit("Hi everyone", &cancel).await.unwrap();
    let err = meeting.voice_message(&reply.id, &cancel).await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    // The text reply stays; only its audio is in error.
    assert_eq!(meeting.messages().len(), 2);
    assert_eq!(meeting.playback().state_of(&reply.id), PlaybackState::Error);
    assert!(meeting.playback().last_error(&reply.id).is_some());
    assert_eq!(meeting.last_error().unwrap().status, Some(403));
}
